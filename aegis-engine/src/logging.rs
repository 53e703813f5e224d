//! Logging bootstrap for the engine and the agent binary

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Whether to enable colored output
    pub enable_colors: bool,

    /// Log file path (optional, if None logs only to stdout)
    pub log_file: Option<String>,

    /// Module-specific log levels
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();

        // Quiet the chatty dependencies by default
        module_levels.insert("chromiumoxide".to_string(), "warn".to_string());
        module_levels.insert("hyper".to_string(), "warn".to_string());
        module_levels.insert("reqwest".to_string(), "warn".to_string());
        module_levels.insert("tungstenite".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            enable_colors: true,
            log_file: None,
            module_levels,
        }
    }
}

/// Initialize logging based on the provided configuration.
///
/// Returns the appender guard when file logging is enabled; the caller must
/// keep it alive for buffered lines to flush.
pub fn init_logging(config: &LoggingConfig) -> EngineResult<Option<WorkerGuard>> {
    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| EngineError::Logging(format!("invalid log directive: {}", e)))?,
        );
    }

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_ansi(config.enable_colors);

    let mut guard = None;
    let file_layer = match &config.log_file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "aegis.log".to_string());
            let appender = tracing_appender::rolling::daily(dir, file);
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    // Ignore double initialization so tests can call this freely
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    match result {
        Ok(_) => tracing::info!(level = %config.level, "logging initialized"),
        Err(_) => tracing::debug!("logging already initialized, skipping"),
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.log_file.is_none());
        assert_eq!(
            config.module_levels.get("chromiumoxide").map(String::as_str),
            Some("warn")
        );
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("bad module name".to_string(), "???".to_string());
        assert!(init_logging(&config).is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config).unwrap();
        init_logging(&config).unwrap();
    }
}
