//! Aegis Controller
//!
//! Top-level orchestrator and the sole entry point for external commands.
//! Owns the interception session, the rule store, and the tab follower;
//! every observable outcome leaves through the event channel.

use crate::ai::{GenerativeBackend, MockCommandParser};
use crate::error::{EngineError, EngineResult};
use crate::follower::TabFollower;
use crate::protocol::{AegisCommand, AegisEvent};
use crate::session::InterceptionSession;
use crate::target::{InterceptTarget, TargetProvider};
use aegis_core::{
    AegisConfig, InterceptedRequest, MockRule, RuleStore, SnapshotStore, ThreatAlert,
};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Inactive,
    Activating,
    Active,
    Deactivating,
}

/// Owns the engine: activation, command dispatch, and the follower task
pub struct AegisController {
    config: AegisConfig,
    state: RwLock<ControllerState>,
    session: Arc<InterceptionSession>,
    rules: Arc<RuleStore>,
    parser: MockCommandParser,
    targets: Arc<dyn TargetProvider>,
    events: UnboundedSender<AegisEvent>,
    focus_tx: UnboundedSender<Arc<dyn InterceptTarget>>,
    _follower: JoinHandle<()>,
}

impl AegisController {
    /// Build a controller and hand back the event stream
    pub fn new(
        config: AegisConfig,
        backend: Arc<dyn GenerativeBackend>,
        targets: Arc<dyn TargetProvider>,
    ) -> (Self, UnboundedReceiver<AegisEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let rules = Arc::new(RuleStore::new(SnapshotStore::new(&config.data_dir)));
        let session = Arc::new(InterceptionSession::new(
            rules.clone(),
            backend.clone(),
            events.clone(),
            config.history_limit,
        ));

        // The follower runs for the controller's lifetime; it only acts
        // while auto-follow is on and the session is attached
        let (focus_tx, focus_rx) = mpsc::unbounded_channel();
        let follower = TabFollower::new(session.clone(), events.clone());
        let follower_task = if config.auto_follow {
            tokio::spawn(follower.run(focus_rx))
        } else {
            tokio::spawn(async move {
                drop(follower);
                drop(focus_rx);
            })
        };

        let controller = Self {
            config,
            state: RwLock::new(ControllerState::Inactive),
            session,
            rules,
            parser: MockCommandParser::new(backend),
            targets,
            events,
            focus_tx,
            _follower: follower_task,
        };
        (controller, events_rx)
    }

    /// Where focus-change notifications go; feed the newly focused tab here
    pub fn focus_sender(&self) -> UnboundedSender<Arc<dyn InterceptTarget>> {
        self.focus_tx.clone()
    }

    /// Attach to the currently active tab and replay persisted state
    pub async fn activate(&self) -> EngineResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != ControllerState::Inactive {
                return Err(EngineError::InvalidState(format!(
                    "cannot activate while {:?}",
                    *state
                )));
            }
            *state = ControllerState::Activating;
        }

        let result = self.activate_inner().await;
        let mut state = self.state.write().await;
        match &result {
            Ok(()) => *state = ControllerState::Active,
            Err(_) => *state = ControllerState::Inactive,
        }
        result
    }

    async fn activate_inner(&self) -> EngineResult<()> {
        let target = self.targets.active_target().await?;
        let tab_url = target.tab_url();
        info!(url = %tab_url, "activating security agent");

        self.session.attach(target).await?;
        let _ = self.events.send(AegisEvent::Activated {
            tab_url: tab_url.clone(),
        });

        // Replay persisted rules and domains so downstream state
        // reconstructs deterministically
        match self.rules.hydrate().await {
            Ok((rules, domains)) => {
                for rule in rules {
                    let _ = self.events.send(AegisEvent::MockCreated { rule });
                }
                for domain in domains {
                    let _ = self.events.send(AegisEvent::DomainBlocked { domain });
                }
            }
            Err(e) => warn!(error = %e, "failed to load persisted interception state"),
        }
        Ok(())
    }

    /// Detach and drop in-memory rules; the persisted snapshots survive for
    /// the next activation
    pub async fn deactivate(&self) -> EngineResult<()> {
        {
            let mut state = self.state.write().await;
            if *state == ControllerState::Inactive {
                // Nothing attached; confirm the terminal state anyway
                let _ = self.events.send(AegisEvent::Deactivated);
                return Ok(());
            }
            *state = ControllerState::Deactivating;
        }
        info!("deactivating security agent");

        if let Err(e) = self.session.detach().await {
            warn!(error = %e, "detach failed during deactivation");
        }
        self.rules.clear_in_memory().await;

        *self.state.write().await = ControllerState::Inactive;
        let _ = self.events.send(AegisEvent::Deactivated);
        Ok(())
    }

    /// Parse a natural-language command into a rule and store it.
    ///
    /// Strict-fail: an unparseable command surfaces an error and never
    /// stores a guessed rule.
    pub async fn create_mock(&self, command: &str) -> EngineResult<MockRule> {
        info!(command, "parsing mock command");
        let draft = self.parser.parse(command).await?;
        let rule = MockRule::from_draft(draft);
        self.rules.insert_rule(rule.clone()).await;
        info!(rule_id = %rule.id, pattern = %rule.url_pattern, "mock rule created");
        let _ = self.events.send(AegisEvent::MockCreated { rule: rule.clone() });
        Ok(rule)
    }

    pub async fn toggle_mock(&self, rule_id: &str) -> EngineResult<()> {
        match self.rules.toggle_rule(rule_id).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // An unknown id is a no-op at the command surface
                warn!(rule_id, error = %e, "toggle ignored");
                Ok(())
            }
        }
    }

    pub async fn delete_mock(&self, rule_id: &str) -> EngineResult<()> {
        self.rules.delete_rule(rule_id).await;
        Ok(())
    }

    pub async fn block_domain(&self, domain: &str) -> EngineResult<()> {
        self.rules.block_domain(domain).await;
        info!(domain, "domain blocked");
        let _ = self.events.send(AegisEvent::DomainBlocked {
            domain: domain.to_lowercase(),
        });
        Ok(())
    }

    pub async fn unblock_domain(&self, domain: &str) -> EngineResult<()> {
        self.rules.unblock_domain(domain).await;
        info!(domain, "domain unblocked");
        let _ = self.events.send(AegisEvent::DomainUnblocked {
            domain: domain.to_lowercase(),
        });
        Ok(())
    }

    pub async fn export_mocks(&self) -> EngineResult<String> {
        let data = self.rules.export_json().await?;
        let _ = self.events.send(AegisEvent::MocksExported { data: data.clone() });
        Ok(data)
    }

    pub async fn import_mocks(&self, json_data: &str) -> EngineResult<usize> {
        let imported = self.rules.import_json(json_data).await?;
        let count = imported.len();
        for rule in imported {
            let _ = self.events.send(AegisEvent::MockCreated { rule });
        }
        let _ = self.events.send(AegisEvent::ImportComplete { count });
        Ok(count)
    }

    /// Dispatch one external command; failures leave as error events
    pub async fn handle_command(&self, command: AegisCommand) {
        let result = match command {
            AegisCommand::Activate => self.activate().await,
            AegisCommand::Deactivate => self.deactivate().await,
            AegisCommand::CreateMock { command } => {
                self.create_mock(&command).await.map(|_| ())
            }
            AegisCommand::ToggleMock { rule_id } => self.toggle_mock(&rule_id).await,
            AegisCommand::DeleteMock { rule_id } => self.delete_mock(&rule_id).await,
            AegisCommand::BlockDomain { domain } => self.block_domain(&domain).await,
            AegisCommand::UnblockDomain { domain } => self.unblock_domain(&domain).await,
            AegisCommand::ExportMocks => self.export_mocks().await.map(|_| ()),
            AegisCommand::ImportMocks { json_data } => {
                self.import_mocks(&json_data).await.map(|_| ())
            }
        };

        if let Err(e) = result {
            let _ = self.events.send(AegisEvent::Error {
                code: e.code(),
                message: e.to_string(),
            });
        }
    }

    pub async fn state(&self) -> ControllerState {
        *self.state.read().await
    }

    pub fn config(&self) -> &AegisConfig {
        &self.config
    }

    /// The bounded window of recent request records
    pub async fn recent_requests(&self) -> Vec<InterceptedRequest> {
        self.session.recent_requests().await
    }

    /// Alerts raised during the current session
    pub async fn alerts(&self) -> Vec<ThreatAlert> {
        self.session.alerts().await
    }
}
