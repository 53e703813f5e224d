//! Interception Session
//!
//! Owns the attachment to one tab's network layer. Every paused request is
//! answered exactly once: fulfilled from a matching mock rule, fulfilled
//! with a synthesized block response, or continued to the network. Each
//! outcome appends one record to the bounded history and emits one event.

use crate::ai::GenerativeBackend;
use crate::error::{EngineError, EngineResult};
use crate::escalator::{RequestMeta, ThreatEscalator};
use crate::protocol::AegisEvent;
use crate::target::{is_privileged_url, InterceptTarget, PausedRequest, SyntheticResponse};
use aegis_core::{
    classifier, AlertAction, AlertSeverity, InterceptedRequest, MockRule, RequestStatus,
    RuleStore, ThreatAlert, ThreatLevel,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Session lifecycle; `AttachFailed` is terminal until a fresh attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Detached,
    Attaching,
    Attached,
    Detaching,
    AttachFailed,
}

/// Everything the intercept loop needs, cloneable into the worker task
#[derive(Clone)]
struct SessionCtx {
    rules: Arc<RuleStore>,
    escalator: ThreatEscalator,
    events: UnboundedSender<AegisEvent>,
    target: Arc<dyn InterceptTarget>,
    history: Arc<RwLock<VecDeque<InterceptedRequest>>>,
    alerts: Arc<RwLock<Vec<ThreatAlert>>>,
    history_limit: usize,
}

/// Attachment to one tab's network layer
pub struct InterceptionSession {
    rules: Arc<RuleStore>,
    escalator: ThreatEscalator,
    events: UnboundedSender<AegisEvent>,
    history_limit: usize,
    state: RwLock<SessionState>,
    target: RwLock<Option<Arc<dyn InterceptTarget>>>,
    history: Arc<RwLock<VecDeque<InterceptedRequest>>>,
    alerts: Arc<RwLock<Vec<ThreatAlert>>>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InterceptionSession {
    pub fn new(
        rules: Arc<RuleStore>,
        backend: Arc<dyn GenerativeBackend>,
        events: UnboundedSender<AegisEvent>,
        history_limit: usize,
    ) -> Self {
        let alerts = Arc::new(RwLock::new(Vec::new()));
        let escalator = ThreatEscalator::new(backend, events.clone(), alerts.clone());
        Self {
            rules,
            escalator,
            events,
            history_limit,
            state: RwLock::new(SessionState::Detached),
            target: RwLock::new(None),
            history: Arc::new(RwLock::new(VecDeque::new())),
            alerts,
            stop_tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Hook into the given tab and start answering its paused requests.
    ///
    /// Privileged pages are rejected before any protocol call. A failed
    /// enable leaves the session in `AttachFailed` with no target.
    pub async fn attach(&self, target: Arc<dyn InterceptTarget>) -> EngineResult<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Detached | SessionState::AttachFailed => {}
                current => {
                    return Err(EngineError::InvalidState(format!(
                        "cannot attach while {:?}",
                        current
                    )))
                }
            }
            *state = SessionState::Attaching;
        }

        let url = target.tab_url();
        if is_privileged_url(&url) {
            *self.state.write().await = SessionState::Detached;
            return Err(EngineError::PrivilegedPage { url });
        }

        let stream = match target.enable_request_pausing().await {
            Ok(stream) => stream,
            Err(e) => {
                error!(url = %url, error = %e, "attach failed");
                *self.state.write().await = SessionState::AttachFailed;
                return Err(e);
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let ctx = SessionCtx {
            rules: self.rules.clone(),
            escalator: self.escalator.clone(),
            events: self.events.clone(),
            target: target.clone(),
            history: self.history.clone(),
            alerts: self.alerts.clone(),
            history_limit: self.history_limit,
        };
        let worker = tokio::spawn(run_intercept_loop(ctx, stream, stop_rx));

        *self.target.write().await = Some(target);
        *self.stop_tx.lock().await = Some(stop_tx);
        *self.worker.lock().await = Some(worker);
        *self.state.write().await = SessionState::Attached;
        info!(url = %url, "request interception active");
        Ok(())
    }

    /// Stop interception and release the tab hook; a no-op when already
    /// detached.
    ///
    /// Ordering matters: the listener stops first so a stale listener can
    /// never observe a later session's requests, then pausing is disabled
    /// on the tab, then the target reference is dropped.
    pub async fn detach(&self) -> EngineResult<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Detached | SessionState::AttachFailed => return Ok(()),
                _ => {}
            }
            *state = SessionState::Detaching;
        }

        if let Some(stop) = self.stop_tx.lock().await.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.lock().await.take() {
            let _ = worker.await;
        }

        let target = self.target.write().await.take();
        if let Some(target) = target {
            if let Err(e) = target.disable_request_pausing().await {
                warn!(error = %e, "failed to disable request pausing during detach");
            }
        }

        *self.state.write().await = SessionState::Detached;
        info!("interception detached");
        Ok(())
    }

    /// Move interception to a new tab: best-effort detach of the old
    /// target, then attach the new one.
    ///
    /// Migration is not atomic; requests in the gap go unobserved. A
    /// failed attach leaves the session with no target.
    pub async fn migrate(&self, new_target: Arc<dyn InterceptTarget>) -> EngineResult<()> {
        if let Err(e) = self.detach().await {
            warn!(error = %e, "detach of old target failed during migration");
        }
        self.attach(new_target)
            .await
            .map_err(|e| EngineError::Migration(e.to_string()))
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn is_attached(&self) -> bool {
        *self.state.read().await == SessionState::Attached
    }

    /// URL of the tab currently intercepted, if any
    pub async fn target_url(&self) -> Option<String> {
        self.target.read().await.as_ref().map(|t| t.tab_url())
    }

    /// The bounded window of most recent request records, oldest first
    pub async fn recent_requests(&self) -> Vec<InterceptedRequest> {
        self.history.read().await.iter().cloned().collect()
    }

    /// All alerts raised since this session was created
    pub async fn alerts(&self) -> Vec<ThreatAlert> {
        self.alerts.read().await.clone()
    }
}

async fn run_intercept_loop(
    ctx: SessionCtx,
    mut stream: BoxStream<'static, PausedRequest>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                debug!("interception listener stopped");
                break;
            }
            next = stream.next() => {
                match next {
                    Some(request) => ctx.process_request(request).await,
                    None => {
                        debug!("paused-request stream ended");
                        break;
                    }
                }
            }
        }
    }
}

impl SessionCtx {
    /// Decide one paused request: mock, block, or continue
    async fn process_request(&self, request: PausedRequest) {
        debug!(method = %request.method, url = %request.url, "request intercepted");

        if let Some(rule) = self
            .rules
            .find_matching_rule(&request.url, &request.method)
            .await
        {
            self.apply_mock(&request, &rule).await;
            return;
        }

        let blocked = self.rules.blocked_domains().await;
        match classifier::classify(&request.url, &blocked) {
            ThreatLevel::Malicious => self.block_request(&request).await,
            level => self.allow_request(&request, level).await,
        }
    }

    async fn apply_mock(&self, request: &PausedRequest, rule: &MockRule) {
        info!(pattern = %rule.url_pattern, code = rule.response_code, "applying mock rule");

        let headers: Vec<(String, String)> = if rule.response_headers.is_empty() {
            vec![("Content-Type".to_string(), "application/json".to_string())]
        } else {
            rule.response_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        let body_b64 = if rule.response_body.is_empty() {
            BASE64.encode(r#"{"mocked":true}"#)
        } else {
            rule.response_body.clone()
        };

        let response = SyntheticResponse {
            response_code: rule.response_code,
            headers,
            body_b64,
        };
        if let Err(e) = self
            .target
            .fulfill_request(&request.request_id, response)
            .await
        {
            // Stale request ids (page navigated away) must not kill the session
            warn!(error = %e, "mock fulfill failed");
        }

        self.record(request, RequestStatus::Mocked, None, Some(rule.response_code))
            .await;
    }

    async fn block_request(&self, request: &PausedRequest) {
        let reason = "Blocked by security agent - malicious domain";
        info!(url = %request.url, "blocking malicious request");

        let body = format!("Blocked by Aegis Security Agent\n\nReason: {}", reason);
        let response = SyntheticResponse {
            response_code: 403,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body_b64: BASE64.encode(body),
        };
        if let Err(e) = self
            .target
            .fulfill_request(&request.request_id, response)
            .await
        {
            warn!(error = %e, "block fulfill failed");
        }

        self.record(
            request,
            RequestStatus::Blocked,
            Some(ThreatLevel::Malicious),
            Some(403),
        )
        .await;

        let alert = ThreatAlert {
            severity: AlertSeverity::Critical,
            threat_type: "malware".to_string(),
            description: reason.to_string(),
            url: request.url.clone(),
            timestamp: Utc::now(),
            action: AlertAction::Blocked,
        };
        self.alerts.write().await.push(alert.clone());
        let _ = self.events.send(AegisEvent::ThreatDetected { alert });
    }

    async fn allow_request(&self, request: &PausedRequest, level: ThreatLevel) {
        if let Err(e) = self.target.continue_request(&request.request_id).await {
            error!(error = %e, "continue request failed");
        }

        let status = if level == ThreatLevel::Suspicious {
            RequestStatus::Suspicious
        } else {
            RequestStatus::Allowed
        };
        self.record(request, status, Some(level), None).await;

        // Deep analysis never holds the request; it already went through
        if level == ThreatLevel::Suspicious {
            debug!(url = %request.url, "escalating suspicious request to AI");
            self.escalator.spawn_escalation(RequestMeta {
                url: request.url.clone(),
                method: request.method.clone(),
                resource_type: request.resource_type.clone(),
            });
        }
    }

    async fn record(
        &self,
        request: &PausedRequest,
        status: RequestStatus,
        threat_level: Option<ThreatLevel>,
        response_code: Option<u16>,
    ) {
        let record = InterceptedRequest {
            id: request.request_id.clone(),
            url: request.url.clone(),
            method: request.method.clone(),
            resource_type: request.resource_type.clone(),
            timestamp: Utc::now(),
            status,
            threat_level,
            response_code,
        };

        {
            let mut history = self.history.write().await;
            history.push_back(record.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }
        let _ = self
            .events
            .send(AegisEvent::RequestIntercepted { request: record });
    }
}
