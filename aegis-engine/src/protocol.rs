//! Command & Event Protocol
//!
//! The closed message surface between the engine and its callers (UI panels,
//! chat features). Commands arrive as a tagged sum type and are dispatched
//! exhaustively; every observable outcome leaves as an event. Error events
//! carry a structured code alongside the human-readable message.

use crate::error::EngineError;
use aegis_core::{CoreError, InterceptedRequest, MockRule, ThreatAlert};
use serde::{Deserialize, Serialize};

/// Commands accepted by the controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum AegisCommand {
    Activate,
    Deactivate,
    CreateMock { command: String },
    ToggleMock { rule_id: String },
    DeleteMock { rule_id: String },
    BlockDomain { domain: String },
    UnblockDomain { domain: String },
    ExportMocks,
    ImportMocks { json_data: String },
}

/// Events emitted by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum AegisEvent {
    Activated { tab_url: String },
    Deactivated,
    RequestIntercepted { request: InterceptedRequest },
    ThreatDetected { alert: ThreatAlert },
    MockCreated { rule: MockRule },
    DomainBlocked { domain: String },
    DomainUnblocked { domain: String },
    MocksExported { data: String },
    ImportComplete { count: usize },
    TabSwitched { tab_url: String },
    Error { code: ErrorCode, message: String },
}

/// Structured error categories carried by error events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    AttachFailed,
    PrivilegedPage,
    RuleParse,
    ImportFailed,
    MigrationFailed,
    InvalidState,
    Internal,
}

impl EngineError {
    /// Map an engine error to its event error code
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Attach(_) | EngineError::BrowserLaunch(_) => ErrorCode::AttachFailed,
            EngineError::PrivilegedPage { .. } => ErrorCode::PrivilegedPage,
            EngineError::Migration(_) => ErrorCode::MigrationFailed,
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::Core(CoreError::RuleParse(_)) => ErrorCode::RuleParse,
            EngineError::Core(CoreError::Import(_)) => ErrorCode::ImportFailed,
            EngineError::Interception(_)
            | EngineError::Generative(_)
            | EngineError::Logging(_)
            | EngineError::Core(_) => ErrorCode::Internal,
        }
    }
}
