//! Tab Follower
//!
//! Migrates the interception session when the user focuses another tab.
//! Privileged pages are skipped (the current target stays monitored), and a
//! failed migration leaves the session unattached with an explicit error
//! event rather than retrying silently.

use crate::protocol::{AegisEvent, ErrorCode};
use crate::session::InterceptionSession;
use crate::target::{is_privileged_url, InterceptTarget};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

/// Focus-change listener driving session migration
pub struct TabFollower {
    session: Arc<InterceptionSession>,
    events: UnboundedSender<AegisEvent>,
}

impl TabFollower {
    pub fn new(session: Arc<InterceptionSession>, events: UnboundedSender<AegisEvent>) -> Self {
        Self { session, events }
    }

    /// Consume focus changes until the channel closes
    pub async fn run(self, mut focus_rx: UnboundedReceiver<Arc<dyn InterceptTarget>>) {
        while let Some(target) = focus_rx.recv().await {
            self.handle_focus_change(target).await;
        }
        debug!("tab follower stopped");
    }

    /// React to one focus change
    pub async fn handle_focus_change(&self, target: Arc<dyn InterceptTarget>) {
        // Only an attached session follows
        if !self.session.is_attached().await {
            return;
        }

        let url = target.tab_url();
        if is_privileged_url(&url) {
            debug!(url = %url, "skipping privileged page, retaining current target");
            return;
        }

        info!(url = %url, "tab switched, following to new tab");
        match self.session.migrate(target).await {
            Ok(()) => {
                info!(url = %url, "now monitoring new tab");
                let _ = self.events.send(AegisEvent::TabSwitched { tab_url: url });
            }
            Err(e) => {
                error!(error = %e, "tab migration failed, no tab is monitored");
                let _ = self.events.send(AegisEvent::Error {
                    code: ErrorCode::MigrationFailed,
                    message: e.to_string(),
                });
            }
        }
    }
}
