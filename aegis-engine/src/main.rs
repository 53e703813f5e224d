//! Aegis Agent Binary Entry Point

use aegis_engine::agent::{run_agent, Args};
use aegis_engine::logging::{init_logging, LoggingConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        log_file: args.log_file.clone(),
        ..LoggingConfig::default()
    };
    let _guard = init_logging(&logging)?;

    if let Err(e) = run_agent(args).await {
        tracing::error!("agent failed: {}", e);
        return Err(e);
    }
    Ok(())
}
