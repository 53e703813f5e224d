//! Aegis Core - Threat Classification & Rule Store
//!
//! This crate holds the pure domain logic of the Aegis interception engine:
//!
//! - **Classifier**: static heuristics mapping a request URL to a threat tier
//! - **MockRule**: pattern-to-canned-response mappings for deterministic
//!   request fulfillment
//! - **RuleStore**: mock rules plus the blocked-domain set, mirrored to
//!   whole-collection JSON snapshots on every mutation
//!
//! No browser or network I/O happens here; the live interception pipeline
//! lives in `aegis-engine`.

pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod rules;
pub mod store;

// Re-exports
pub use config::{AegisConfig, GenerativeConfig};
pub use error::{CoreError, CoreResult};
pub use model::{
    AlertAction, AlertSeverity, InterceptedRequest, MockRule, MockRuleDraft, RequestStatus,
    ThreatAlert, ThreatLevel, DEFAULT_HISTORY_LIMIT,
};
pub use rules::RuleStore;
pub use store::SnapshotStore;
