//! Aegis Core Error Types

use thiserror::Error;

/// Main error type for rule and classification operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Rule parse failed: {0}")]
    RuleParse(String),

    #[error("Rule not found: {id}")]
    RuleNotFound { id: String },

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
