//! Agent Runtime
//!
//! Wires the engine to a launched browser: opens the start tab, activates
//! the controller, and logs every emitted event until shutdown.

use crate::ai::HttpGenerativeBackend;
use crate::browser::{self, BrowserOptions, ManagedBrowser};
use crate::controller::AegisController;
use crate::error::EngineResult;
use crate::target::{CdpTarget, InterceptTarget, TargetProvider};
use aegis_core::AegisConfig;
use async_trait::async_trait;
use chromiumoxide::Page;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Command-line arguments for the agent
#[derive(Parser, Debug, Clone)]
#[command(name = "aegis-agent", about = "Monitor a browser tab's network traffic")]
pub struct Args {
    /// Start URL to open and monitor
    #[arg(long, default_value = "https://example.com")]
    pub url: String,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Directory for persisted rules and blocked domains
    #[arg(long, default_value = "./aegis-data")]
    pub data_dir: PathBuf,

    /// API key for the generative-AI backend; falls back to AEGIS_API_KEY
    #[arg(long, default_value = "")]
    pub api_key: String,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Optional log file
    #[arg(long)]
    pub log_file: Option<String>,
}

impl Args {
    pub fn into_config(self) -> AegisConfig {
        let mut config = AegisConfig {
            data_dir: self.data_dir,
            ..AegisConfig::default()
        };
        config.generative.api_key = if self.api_key.is_empty() {
            std::env::var("AEGIS_API_KEY").unwrap_or_default()
        } else {
            self.api_key
        };
        config
    }
}

/// Serves the agent's single monitored page as the active target
struct SinglePageProvider {
    page: Page,
}

#[async_trait]
impl TargetProvider for SinglePageProvider {
    async fn active_target(&self) -> EngineResult<Arc<dyn InterceptTarget>> {
        let target = CdpTarget::new(self.page.clone()).await?;
        Ok(Arc::new(target))
    }
}

/// Launch a browser, activate the engine on the start tab, and run until
/// Ctrl-C
pub async fn run_agent(args: Args) -> anyhow::Result<()> {
    let start_url = args.url.clone();
    let headed = args.headed;
    let config = args.into_config();

    let options = if headed {
        BrowserOptions::headed()
    } else {
        BrowserOptions::default()
    };
    let managed: ManagedBrowser = browser::launch(options).await?;
    let page = managed.open_tab(&start_url).await?;

    let backend = Arc::new(HttpGenerativeBackend::new(config.generative.clone()));
    let provider = Arc::new(SinglePageProvider { page });
    let (controller, mut events) = AegisController::new(config, backend, provider);

    // Surface every engine event in the log
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!(event = %json, "aegis event"),
                Err(e) => error!(error = %e, "failed to encode event"),
            }
        }
    });

    controller.activate().await?;
    info!(url = %start_url, "security agent active, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping security agent");

    if let Err(e) = controller.deactivate().await {
        error!(error = %e, "deactivation failed");
    }
    printer.abort();
    managed.close().await?;
    Ok(())
}
