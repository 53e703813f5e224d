//! Browser Management Module
//!
//! Handles Chromium browser lifecycle and configuration for the agent: a
//! launched instance with a dedicated profile directory whose tabs the
//! engine attaches to.

use crate::error::{EngineError, EngineResult};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Browser launch options
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run in headless mode (no visible UI)
    pub headless: bool,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
    /// Window size
    pub window_size: Option<(u32, u32)>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            extra_args: Vec::new(),
            window_size: Some((1920, 1080)),
        }
    }
}

impl BrowserOptions {
    /// Create options for headed (visible) browser
    pub fn headed() -> Self {
        Self {
            headless: false,
            ..Default::default()
        }
    }
}

/// Managed browser instance
pub struct ManagedBrowser {
    browser: Browser,
    user_data_dir: PathBuf,
    _handler_task: JoinHandle<()>,
}

impl ManagedBrowser {
    /// Open a new tab and navigate it to the given URL
    pub async fn open_tab(&self, url: &str) -> EngineResult<Page> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| EngineError::BrowserLaunch(format!("failed to open tab: {}", e)))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| EngineError::BrowserLaunch(format!("navigation failed: {}", e)))?;
        Ok(page)
    }

    /// Close the browser and clean up its profile directory
    pub async fn close(self) -> EngineResult<()> {
        drop(self.browser);
        info!("browser closed");

        if self.user_data_dir.exists() {
            info!("cleaning up browser profile: {:?}", self.user_data_dir);
            if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
                warn!("failed to remove browser profile dir: {:?}", e);
            }
        }
        Ok(())
    }
}

/// Launch a new browser instance
pub async fn launch(options: BrowserOptions) -> EngineResult<ManagedBrowser> {
    let mut config_builder = BrowserConfig::builder();

    // Use a unique user data directory to avoid SingletonLock errors
    let user_data_dir = std::env::temp_dir().join(format!("aegis_browser_{}", Uuid::new_v4()));
    config_builder = config_builder.user_data_dir(&user_data_dir);

    if !options.headless {
        config_builder = config_builder.with_head();
    }

    if let Some((width, height)) = options.window_size {
        config_builder = config_builder.arg(format!("--window-size={},{}", width, height));
    }

    for arg in &options.extra_args {
        config_builder = config_builder.arg(arg);
    }

    // Standard args for automation
    config_builder = config_builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--no-first-run")
        .arg("--no-default-browser-check");

    let config = config_builder
        .build()
        .map_err(EngineError::BrowserLaunch)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| EngineError::BrowserLaunch(format!("failed to launch browser: {}", e)))?;

    // Drive the CDP connection for the browser's lifetime
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                warn!("browser event error: {:?}", e);
            }
        }
    });

    info!(headless = options.headless, "browser launched");

    Ok(ManagedBrowser {
        browser,
        user_data_dir,
        _handler_task: handler_task,
    })
}
