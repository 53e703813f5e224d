//! Aegis Data Models
//!
//! Core data structures for request interception: threat tiers, mock rules,
//! intercepted-request records, and threat alerts.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use wildmatch::WildMatch;

/// Default bound on the intercepted-request history window
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Threat tier assigned to a request URL
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Safe,
    Suspicious,
    Malicious,
}

/// Outcome recorded for an intercepted request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Allowed,
    Blocked,
    Mocked,
    Suspicious,
}

/// Severity of a threat alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// What the engine did about the request an alert describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    /// Request was fulfilled with a synthesized block response
    Blocked,
    /// Request was let through to the network
    Allowed,
    /// Request already went through; flagged retroactively
    Flagged,
}

/// A security alert raised by the classifier or by AI escalation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThreatAlert {
    pub severity: AlertSeverity,
    /// Threat category, e.g. "malware", "xss", "phishing"
    pub threat_type: String,
    pub description: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub action: AlertAction,
}

/// One observed request and its outcome
///
/// The `id` is the interception protocol's request identifier. It is only
/// unique within a single attachment, so it must never be used as a
/// persistent key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedRequest {
    pub id: String,
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<ThreatLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
}

/// Structured output of the natural-language mock-command parse step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRuleDraft {
    pub url_pattern: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub response_code: Option<u16>,
    /// Response payload as parsed JSON; encoded on rule creation
    #[serde(default)]
    pub response_body: Option<serde_json::Value>,
}

/// A pattern-to-canned-response mapping used to fulfill matching requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MockRule {
    /// Immutable, stamp-derived identifier; unique within a store
    pub id: String,
    /// Substring or `*`-glob pattern; `*` alone matches everything
    pub url_pattern: String,
    /// HTTP method to match; `None` or `ANY` matches any method
    pub method: Option<String>,
    pub response_code: u16,
    /// Response payload, pre-encoded as base64 so it survives JSON
    /// persistence round-trips unchanged
    pub response_body: String,
    pub response_headers: HashMap<String, String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

// Stamp guard: two rules created within the same millisecond still get
// distinct, strictly increasing ids.
static LAST_RULE_STAMP: AtomicI64 = AtomicI64::new(0);

fn next_rule_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    loop {
        let last = LAST_RULE_STAMP.load(Ordering::SeqCst);
        let candidate = now.max(last + 1);
        if LAST_RULE_STAMP
            .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return candidate;
        }
    }
}

impl MockRule {
    /// Build a full rule from a parsed draft, filling defaults for the
    /// fields the command did not mention.
    pub fn from_draft(draft: MockRuleDraft) -> Self {
        let body_json = draft
            .response_body
            .unwrap_or_else(|| serde_json::json!({ "error": "Mocked by Aegis" }));
        let body = BASE64.encode(body_json.to_string());

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("X-Mocked-By".to_string(), "Aegis".to_string());

        Self {
            id: format!("mock-{}", next_rule_stamp()),
            url_pattern: draft.url_pattern,
            method: draft.method,
            response_code: draft.response_code.unwrap_or(404),
            response_body: body,
            response_headers: headers,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Check whether this rule applies to a request
    ///
    /// URL match: `*` matches everything; otherwise the pattern matches as
    /// a plain substring, or as a `*`-glob matched anywhere in the URL.
    /// Method match: `None` and `ANY` accept any method.
    pub fn matches(&self, url: &str, method: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let url_match = self.url_pattern == "*"
            || url.contains(&self.url_pattern)
            || WildMatch::new(&format!("*{}*", self.url_pattern)).matches(url);
        if !url_match {
            return false;
        }

        match &self.method {
            None => true,
            Some(m) => m.eq_ignore_ascii_case("ANY") || m.eq_ignore_ascii_case(method),
        }
    }
}
