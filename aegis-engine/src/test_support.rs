//! Shared fakes for engine unit tests

use crate::ai::GenerativeBackend;
use crate::error::{EngineError, EngineResult};
use crate::target::{InterceptTarget, PausedRequest, SyntheticResponse};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Build a paused request for tests
pub fn paused(id: &str, url: &str, method: &str) -> PausedRequest {
    PausedRequest {
        request_id: id.to_string(),
        url: url.to_string(),
        method: method.to_string(),
        resource_type: Some("Document".to_string()),
    }
}

/// Poll a condition until it holds or a 2s deadline passes
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

/// Scriptable interception target
pub struct StubTarget {
    url: String,
    fail_attach: bool,
    fail_continue: bool,
    feed: Mutex<Option<mpsc::UnboundedSender<PausedRequest>>>,
    continued: Mutex<Vec<String>>,
    fulfilled: Mutex<Vec<(String, SyntheticResponse)>>,
    disabled: AtomicBool,
}

impl StubTarget {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            fail_attach: false,
            fail_continue: false,
            feed: Mutex::new(None),
            continued: Mutex::new(Vec::new()),
            fulfilled: Mutex::new(Vec::new()),
            disabled: AtomicBool::new(false),
        })
    }

    pub fn failing_attach(url: &str) -> Arc<Self> {
        let mut target = Self::unwrapped(url);
        target.fail_attach = true;
        Arc::new(target)
    }

    pub fn fail_continue(url: &str) -> Arc<Self> {
        let mut target = Self::unwrapped(url);
        target.fail_continue = true;
        Arc::new(target)
    }

    fn unwrapped(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fail_attach: false,
            fail_continue: false,
            feed: Mutex::new(None),
            continued: Mutex::new(Vec::new()),
            fulfilled: Mutex::new(Vec::new()),
            disabled: AtomicBool::new(false),
        }
    }

    /// Feed a paused request into the attached session; silently dropped
    /// when nobody is listening anymore
    pub fn push(&self, request: PausedRequest) {
        if let Some(tx) = self.feed.lock().unwrap().as_ref() {
            let _ = tx.send(request);
        }
    }

    pub fn continued_ids(&self) -> Vec<String> {
        self.continued.lock().unwrap().clone()
    }

    pub fn fulfilled(&self) -> Vec<(String, SyntheticResponse)> {
        self.fulfilled.lock().unwrap().clone()
    }

    pub fn fulfilled_ids(&self) -> Vec<String> {
        self.fulfilled
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn pausing_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InterceptTarget for StubTarget {
    fn tab_url(&self) -> String {
        self.url.clone()
    }

    async fn enable_request_pausing(&self) -> EngineResult<BoxStream<'static, PausedRequest>> {
        if self.fail_attach {
            return Err(EngineError::Attach("tab closed".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap() = Some(tx);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|request| (request, rx))
        });
        Ok(stream.boxed())
    }

    async fn disable_request_pausing(&self) -> EngineResult<()> {
        self.disabled.store(true, Ordering::SeqCst);
        *self.feed.lock().unwrap() = None;
        Ok(())
    }

    async fn continue_request(&self, request_id: &str) -> EngineResult<()> {
        if self.fail_continue {
            return Err(EngineError::Interception(format!(
                "stale request id {}",
                request_id
            )));
        }
        self.continued.lock().unwrap().push(request_id.to_string());
        Ok(())
    }

    async fn fulfill_request(
        &self,
        request_id: &str,
        response: SyntheticResponse,
    ) -> EngineResult<()> {
        self.fulfilled
            .lock()
            .unwrap()
            .push((request_id.to_string(), response));
        Ok(())
    }
}

/// Scriptable generative backend
pub struct StubBackend {
    response: Option<String>,
    gate: tokio::sync::Mutex<Option<oneshot::Receiver<()>>>,
}

impl StubBackend {
    /// Always answers with the given text
    pub fn respond(text: &str) -> Self {
        Self {
            response: Some(text.to_string()),
            gate: tokio::sync::Mutex::new(None),
        }
    }

    /// Always fails
    pub fn failing() -> Self {
        Self {
            response: None,
            gate: tokio::sync::Mutex::new(None),
        }
    }

    /// Holds the response until the gate sender fires
    pub fn gated(gate: oneshot::Receiver<()>, text: &str) -> Self {
        Self {
            response: Some(text.to_string()),
            gate: tokio::sync::Mutex::new(Some(gate)),
        }
    }
}

#[async_trait]
impl GenerativeBackend for StubBackend {
    async fn generate(&self, _prompt: &str) -> EngineResult<String> {
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match &self.response {
            Some(text) => Ok(text.clone()),
            None => Err(EngineError::Generative("backend unavailable".to_string())),
        }
    }
}
