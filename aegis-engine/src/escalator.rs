//! AI Threat Escalation
//!
//! Secondary, asynchronous re-classification of requests the static
//! classifier marked suspicious. The request has already been allowed
//! through by the time escalation resolves; a confirmed verdict produces a
//! retroactive alert, never a block. Escalation failures are logged and
//! swallowed.

use crate::ai::{extract_json_object, GenerativeBackend};
use crate::error::{EngineError, EngineResult};
use crate::protocol::AegisEvent;
use aegis_core::{AlertAction, AlertSeverity, ThreatAlert, ThreatLevel};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Metadata of the request under escalation
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub url: String,
    pub method: String,
    pub resource_type: Option<String>,
}

/// Parsed verdict returned by the AI backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatAssessment {
    pub verdict: ThreatLevel,
    #[serde(default)]
    pub threat_type: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Fire-and-forget escalation pipeline
#[derive(Clone)]
pub struct ThreatEscalator {
    backend: Arc<dyn GenerativeBackend>,
    events: UnboundedSender<AegisEvent>,
    alerts: Arc<RwLock<Vec<ThreatAlert>>>,
}

impl ThreatEscalator {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        events: UnboundedSender<AegisEvent>,
        alerts: Arc<RwLock<Vec<ThreatAlert>>>,
    ) -> Self {
        Self {
            backend,
            events,
            alerts,
        }
    }

    /// Spawn an escalation task; never blocks, never reports failure upward
    pub fn spawn_escalation(&self, meta: RequestMeta) {
        let this = self.clone();
        tokio::spawn(async move {
            let url = meta.url.clone();
            if let Err(e) = this.escalate(meta).await {
                warn!(url = %url, error = %e, "threat analysis failed");
            }
        });
    }

    /// Run one escalation to completion and emit the resulting alert, if any
    pub async fn escalate(&self, meta: RequestMeta) -> EngineResult<()> {
        debug!(url = %meta.url, "escalating suspicious request");

        let text = self.backend.generate(&threat_prompt(&meta)).await?;
        let assessment = parse_assessment(&text)?;
        info!(
            url = %meta.url,
            verdict = ?assessment.verdict,
            confidence = assessment.confidence,
            "threat analysis complete"
        );

        let alert = match assessment.verdict {
            ThreatLevel::Malicious if assessment.confidence > 0.7 => Some(ThreatAlert {
                severity: AlertSeverity::Critical,
                threat_type: assessment
                    .threat_type
                    .unwrap_or_else(|| "suspicious".to_string()),
                description: format!("AI Analysis: {}", assessment.reasoning),
                url: meta.url,
                timestamp: Utc::now(),
                // The request already went through; this is retroactive
                action: AlertAction::Flagged,
            }),
            ThreatLevel::Suspicious => Some(ThreatAlert {
                severity: AlertSeverity::Medium,
                threat_type: assessment
                    .threat_type
                    .unwrap_or_else(|| "suspicious".to_string()),
                description: format!("AI flagged as suspicious: {}", assessment.reasoning),
                url: meta.url,
                timestamp: Utc::now(),
                action: AlertAction::Allowed,
            }),
            _ => None,
        };

        if let Some(alert) = alert {
            self.alerts.write().await.push(alert.clone());
            let _ = self.events.send(AegisEvent::ThreatDetected { alert });
        }
        Ok(())
    }
}

/// Parse a model response into a threat assessment
pub fn parse_assessment(text: &str) -> EngineResult<ThreatAssessment> {
    let json = extract_json_object(text, "verdict")
        .ok_or_else(|| EngineError::Generative("no verdict object in response".to_string()))?;
    serde_json::from_str(&json)
        .map_err(|e| EngineError::Generative(format!("invalid verdict object: {}", e)))
}

fn threat_prompt(meta: &RequestMeta) -> String {
    format!(
        r#"You are a cybersecurity expert analyzing a potentially suspicious network request.

Request Details:
- URL: {url}
- Method: {method}
- Resource Type: {resource_type}

Analyze this request and determine:
1. Is it likely malicious, suspicious, or safe?
2. What type of threat does it represent (if any)?
3. Should it be blocked or allowed?
4. What's your confidence level?

Consider:
- URL patterns (eval, cmd, shell parameters)
- Domain reputation (suspicious TLDs, unknown domains)
- Request patterns (XSS, SQLi, command injection attempts)
- Context (is this a known CDN, API endpoint, etc.)

Respond with JSON:
{{
  "verdict": "malicious" | "suspicious" | "safe",
  "threatType": "xss" | "sqli" | "malware" | "phishing" | "none",
  "confidence": 0.0-1.0,
  "reasoning": "Brief explanation",
  "recommendation": "block" | "allow" | "monitor"
}}"#,
        url = meta.url,
        method = meta.method,
        resource_type = meta.resource_type.as_deref().unwrap_or("unknown"),
    )
}
