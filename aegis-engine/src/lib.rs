//! Aegis Engine - Network Interception & Threat Mediation
//!
//! Attaches to a live browser tab's network layer, pauses every outgoing
//! request before it reaches the wire, and decides it once: fulfilled from a
//! mock rule, blocked with a synthesized response, or continued untouched.
//! Suspicious requests escalate to a generative-AI backend after they have
//! already been allowed through.
//!
//! ## Core Concepts
//!
//! - **InterceptionSession**: the attachment to one tab and its
//!   paused-request loop
//! - **AegisController**: lifecycle, command dispatch, and the event stream
//! - **TabFollower**: migrates the session when tab focus changes
//! - **ThreatEscalator**: fire-and-forget AI re-classification
//!
//! ## Example
//!
//! ```rust,ignore
//! use aegis_engine::{AegisController, HttpGenerativeBackend};
//!
//! let (controller, mut events) = AegisController::new(config, backend, targets);
//! controller.activate().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod agent;
pub mod ai;
pub mod browser;
pub mod controller;
pub mod error;
pub mod escalator;
pub mod follower;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use ai::{GenerativeBackend, HttpGenerativeBackend, MockCommandParser};
pub use controller::{AegisController, ControllerState};
pub use error::{EngineError, EngineResult};
pub use escalator::{RequestMeta, ThreatAssessment, ThreatEscalator};
pub use follower::TabFollower;
pub use logging::{init_logging, LoggingConfig};
pub use protocol::{AegisCommand, AegisEvent, ErrorCode};
pub use session::{InterceptionSession, SessionState};
pub use target::{
    is_privileged_url, CdpTarget, InterceptTarget, PausedRequest, SyntheticResponse,
    TargetProvider,
};
