//! Configuration types and utilities

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Static Aegis Startup Configuration
/// These settings are set at startup and do not change during runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AegisConfig {
    /// Directory holding the persisted rule and domain snapshots
    pub data_dir: PathBuf,
    /// Bound on the intercepted-request history window
    pub history_limit: usize,
    /// Whether focus changes migrate the intercepted tab
    pub auto_follow: bool,
    /// Generative-AI backend configuration
    pub generative: GenerativeConfig,
}

impl Default for AegisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./aegis-data"),
            history_limit: crate::model::DEFAULT_HISTORY_LIMIT,
            auto_follow: true,
            generative: GenerativeConfig::default(),
        }
    }
}

/// Generative-AI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    /// Base endpoint of the generateContent-style API
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// API key; empty disables escalation and mock parsing
    pub api_key: String,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
        }
    }
}
