//! End-to-end engine flow: activation, mocking, blocking, export/import,
//! tab following, and reactivation against persisted state.

use aegis_engine::{
    AegisCommand, AegisController, AegisEvent, ControllerState, EngineError, EngineResult,
    GenerativeBackend, InterceptTarget, PausedRequest, SyntheticResponse, TargetProvider,
};
use aegis_core::{AegisConfig, RequestStatus};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeTab {
    url: String,
    feed: Mutex<Option<mpsc::UnboundedSender<PausedRequest>>>,
    continued: Mutex<Vec<String>>,
    fulfilled: Mutex<Vec<(String, SyntheticResponse)>>,
}

impl FakeTab {
    fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            feed: Mutex::new(None),
            continued: Mutex::new(Vec::new()),
            fulfilled: Mutex::new(Vec::new()),
        })
    }

    fn request(&self, id: &str, url: &str, method: &str) {
        let feed = self.feed.lock().unwrap();
        let tx = feed.as_ref().expect("tab is not being intercepted");
        tx.send(PausedRequest {
            request_id: id.to_string(),
            url: url.to_string(),
            method: method.to_string(),
            resource_type: Some("Fetch".to_string()),
        })
        .expect("interception loop is gone");
    }

    fn fulfilled(&self) -> Vec<(String, SyntheticResponse)> {
        self.fulfilled.lock().unwrap().clone()
    }

    fn continued(&self) -> Vec<String> {
        self.continued.lock().unwrap().clone()
    }
}

#[async_trait]
impl InterceptTarget for FakeTab {
    fn tab_url(&self) -> String {
        self.url.clone()
    }

    async fn enable_request_pausing(&self) -> EngineResult<BoxStream<'static, PausedRequest>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap() = Some(tx);
        let stream =
            futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|r| (r, rx)) });
        Ok(stream.boxed())
    }

    async fn disable_request_pausing(&self) -> EngineResult<()> {
        *self.feed.lock().unwrap() = None;
        Ok(())
    }

    async fn continue_request(&self, request_id: &str) -> EngineResult<()> {
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

struct FakeTabs {
    active: Mutex<Arc<FakeTab>>,
}

impl FakeTabs {
    fn new(tab: Arc<FakeTab>) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(tab),
        })
    }
}

#[async_trait]
impl TargetProvider for FakeTabs {
    async fn active_target(&self) -> EngineResult<Arc<dyn InterceptTarget>> {
        Ok(self.active.lock().unwrap().clone())
    }
}

struct ScriptedModel {
    response: String,
}

#[async_trait]
impl GenerativeBackend for ScriptedModel {
    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        // Answer the mock-parse prompt; anything else is an escalation we
        // keep quiet about
        if prompt.contains("API mocking command") {
            Ok(self.response.clone())
        } else {
            Err(EngineError::Generative("escalation disabled".to_string()))
        }
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<AegisEvent>) -> AegisEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn controller(
    dir: &tempfile::TempDir,
    tab: Arc<FakeTab>,
) -> (AegisController, mpsc::UnboundedReceiver<AegisEvent>) {
    let config = AegisConfig {
        data_dir: dir.path().to_path_buf(),
        ..AegisConfig::default()
    };
    let backend = Arc::new(ScriptedModel {
        response: r#"{"urlPattern": "/api/users", "method": null, "responseCode": 404, "responseBody": {"error": "Not Found"}}"#.to_string(),
    });
    AegisController::new(config, backend, FakeTabs::new(tab))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let tab = FakeTab::new("https://shop.example.com");
    let (controller, mut events) = controller(&dir, tab.clone());

    // Activate on the current tab
    controller.handle_command(AegisCommand::Activate).await;
    assert_eq!(
        next_event(&mut events).await,
        AegisEvent::Activated {
            tab_url: "https://shop.example.com".to_string()
        }
    );
    assert_eq!(controller.state().await, ControllerState::Active);

    // Create a mock from a natural-language command
    controller
        .handle_command(AegisCommand::CreateMock {
            command: "Mock /api/users with a 404".to_string(),
        })
        .await;
    let rule_id = match next_event(&mut events).await {
        AegisEvent::MockCreated { rule } => {
            assert_eq!(rule.url_pattern, "/api/users");
            assert_eq!(rule.response_code, 404);
            rule.id
        }
        other => panic!("unexpected event: {:?}", other),
    };

    // A matching request is fulfilled by the mock; classification never runs
    tab.request("r1", "https://shop.example.com/api/users", "GET");
    match next_event(&mut events).await {
        AegisEvent::RequestIntercepted { request } => {
            assert_eq!(request.status, RequestStatus::Mocked);
            assert_eq!(request.response_code, Some(404));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(tab.fulfilled().len(), 1);

    // A non-matching request flows through to the network
    tab.request("r2", "https://shop.example.com/api/other", "POST");
    match next_event(&mut events).await {
        AegisEvent::RequestIntercepted { request } => {
            assert_eq!(request.status, RequestStatus::Allowed);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(tab.continued(), vec!["r2"]);

    // Block a domain and watch the verdict flip
    controller
        .handle_command(AegisCommand::BlockDomain {
            domain: "cdn.badstuff.example".to_string(),
        })
        .await;
    assert_eq!(
        next_event(&mut events).await,
        AegisEvent::DomainBlocked {
            domain: "cdn.badstuff.example".to_string()
        }
    );

    tab.request("r3", "https://cdn.badstuff.example/lib.js", "GET");
    match next_event(&mut events).await {
        AegisEvent::RequestIntercepted { request } => {
            assert_eq!(request.status, RequestStatus::Blocked);
            assert_eq!(request.response_code, Some(403));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(
        next_event(&mut events).await,
        AegisEvent::ThreatDetected { .. }
    ));

    // Toggle the mock off; the request now falls through
    controller
        .handle_command(AegisCommand::ToggleMock {
            rule_id: rule_id.clone(),
        })
        .await;
    tab.request("r4", "https://shop.example.com/api/users", "GET");
    match next_event(&mut events).await {
        AegisEvent::RequestIntercepted { request } => {
            assert_eq!(request.status, RequestStatus::Allowed);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // Export round-trips through import without duplication
    controller.handle_command(AegisCommand::ExportMocks).await;
    let exported = match next_event(&mut events).await {
        AegisEvent::MocksExported { data } => data,
        other => panic!("unexpected event: {:?}", other),
    };
    let parsed: serde_json::Value = serde_json::from_str(&exported).unwrap();
    assert!(parsed.is_array());
    controller
        .handle_command(AegisCommand::ImportMocks {
            json_data: exported,
        })
        .await;
    match next_event(&mut events).await {
        AegisEvent::MockCreated { rule } => assert_eq!(rule.id, rule_id),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(
        next_event(&mut events).await,
        AegisEvent::ImportComplete { count: 1 }
    );

    controller.handle_command(AegisCommand::Deactivate).await;
    assert_eq!(next_event(&mut events).await, AegisEvent::Deactivated);
    assert_eq!(controller.state().await, ControllerState::Inactive);
}

#[tokio::test]
async fn reactivation_replays_persisted_rules() {
    let dir = tempfile::tempdir().unwrap();

    {
        let tab = FakeTab::new("https://shop.example.com");
        let (controller, mut events) = controller(&dir, tab);
        controller.handle_command(AegisCommand::Activate).await;
        let _ = next_event(&mut events).await;
        controller
            .handle_command(AegisCommand::CreateMock {
                command: "Mock /api/users with a 404".to_string(),
            })
            .await;
        let _ = next_event(&mut events).await;
        controller.handle_command(AegisCommand::Deactivate).await;
    }

    let tab = FakeTab::new("https://shop.example.com");
    let (controller, mut events) = controller(&dir, tab.clone());
    controller.handle_command(AegisCommand::Activate).await;

    assert!(matches!(
        next_event(&mut events).await,
        AegisEvent::Activated { .. }
    ));
    match next_event(&mut events).await {
        AegisEvent::MockCreated { rule } => assert_eq!(rule.url_pattern, "/api/users"),
        other => panic!("unexpected event: {:?}", other),
    }

    // The replayed rule intercepts immediately
    tab.request("r1", "https://shop.example.com/api/users", "GET");
    loop {
        match next_event(&mut events).await {
            AegisEvent::RequestIntercepted { request } => {
                assert_eq!(request.status, RequestStatus::Mocked);
                break;
            }
            AegisEvent::DomainBlocked { .. } => continue,
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[tokio::test]
async fn tab_switch_migrates_interception() {
    let dir = tempfile::tempdir().unwrap();
    let first = FakeTab::new("https://a.example.com");
    let (controller, mut events) = controller(&dir, first.clone());

    controller.handle_command(AegisCommand::Activate).await;
    let _ = next_event(&mut events).await;

    // Focus moves to another tab
    let second = FakeTab::new("https://b.example.com");
    controller.focus_sender().send(second.clone()).unwrap();

    assert_eq!(
        next_event(&mut events).await,
        AegisEvent::TabSwitched {
            tab_url: "https://b.example.com".to_string()
        }
    );

    // Requests on the new tab are observed
    second.request("r1", "https://b.example.com/index.html", "GET");
    match next_event(&mut events).await {
        AegisEvent::RequestIntercepted { request } => {
            assert_eq!(request.url, "https://b.example.com/index.html");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // Privileged tabs are never followed
    let internal = FakeTab::new("chrome://extensions");
    controller.focus_sender().send(internal).unwrap();
    second.request("r2", "https://b.example.com/next.html", "GET");
    match next_event(&mut events).await {
        AegisEvent::RequestIntercepted { request } => assert_eq!(request.id, "r2"),
        other => panic!("unexpected event: {:?}", other),
    }
}
