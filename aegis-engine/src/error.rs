//! Aegis Engine Error Types

use aegis_core::CoreError;
use thiserror::Error;

/// Main error type for the interception engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Failed to attach to tab: {0}")]
    Attach(String),

    #[error("Cannot monitor privileged page: {url}")]
    PrivilegedPage { url: String },

    #[error("Interception error: {0}")]
    Interception(String),

    #[error("Tab migration failed: {0}")]
    Migration(String),

    #[error("AI backend error: {0}")]
    Generative(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
