//! Interception Targets
//!
//! Abstraction over one browser tab's network layer: enable request pausing,
//! receive paused requests, and answer each one with a continue or a
//! synthesized fulfillment. The production implementation drives the CDP
//! Fetch domain through chromiumoxide; tests substitute their own targets.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, DisableParams, EnableParams, EventRequestPaused, FulfillRequestParams,
    HeaderEntry, RequestPattern, RequestStage,
};
use chromiumoxide::Page;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

/// URL schemes belonging to privileged/internal pages that must never be
/// attached to
const PRIVILEGED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "devtools://",
    "about:",
];

/// True for browser-internal pages the engine refuses to monitor
pub fn is_privileged_url(url: &str) -> bool {
    PRIVILEGED_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// A request paused before it reaches the wire
#[derive(Debug, Clone)]
pub struct PausedRequest {
    /// Protocol request identifier; only valid within this attachment
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub resource_type: Option<String>,
}

/// A synthesized response used to fulfill a paused request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticResponse {
    pub response_code: u16,
    pub headers: Vec<(String, String)>,
    /// Response payload, pre-encoded as base64
    pub body_b64: String,
}

/// One browser tab's network-interception hook
#[async_trait]
pub trait InterceptTarget: Send + Sync {
    /// URL of the tab at attach time
    fn tab_url(&self) -> String;

    /// Enable request pausing for all outgoing requests and return the
    /// stream of paused requests
    async fn enable_request_pausing(&self) -> EngineResult<BoxStream<'static, PausedRequest>>;

    /// Disable request pausing and release the hook
    async fn disable_request_pausing(&self) -> EngineResult<()>;

    /// Let a paused request proceed to the network unmodified
    async fn continue_request(&self, request_id: &str) -> EngineResult<()>;

    /// Answer a paused request with a synthesized response
    async fn fulfill_request(
        &self,
        request_id: &str,
        response: SyntheticResponse,
    ) -> EngineResult<()>;
}

/// Source of the currently focused tab, used by activation
#[async_trait]
pub trait TargetProvider: Send + Sync {
    async fn active_target(&self) -> EngineResult<std::sync::Arc<dyn InterceptTarget>>;
}

/// CDP Fetch-domain implementation over a chromiumoxide page
pub struct CdpTarget {
    page: Page,
    url: String,
}

impl CdpTarget {
    /// Wrap a page, capturing its current URL
    pub async fn new(page: Page) -> EngineResult<Self> {
        let url = page
            .url()
            .await
            .map_err(|e| EngineError::Attach(format!("failed to read tab URL: {}", e)))?
            .unwrap_or_else(|| "about:blank".to_string());
        Ok(Self { page, url })
    }
}

#[async_trait]
impl InterceptTarget for CdpTarget {
    fn tab_url(&self) -> String {
        self.url.clone()
    }

    async fn enable_request_pausing(&self) -> EngineResult<BoxStream<'static, PausedRequest>> {
        // Subscribe before enabling so no early pause is missed
        let events = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| EngineError::Attach(format!("failed to listen for paused requests: {}", e)))?;

        let params = EnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build();
        self.page
            .execute(params)
            .await
            .map_err(|e| EngineError::Attach(format!("failed to enable request pausing: {}", e)))?;

        debug!(url = %self.url, "request pausing enabled");

        let stream = events.map(|event| PausedRequest {
            request_id: event.request_id.inner().clone(),
            url: event.request.url.clone(),
            method: event.request.method.clone(),
            resource_type: Some(format!("{:?}", event.resource_type)),
        });
        Ok(stream.boxed())
    }

    async fn disable_request_pausing(&self) -> EngineResult<()> {
        self.page
            .execute(DisableParams::default())
            .await
            .map_err(|e| EngineError::Interception(format!("failed to disable pausing: {}", e)))?;
        Ok(())
    }

    async fn continue_request(&self, request_id: &str) -> EngineResult<()> {
        self.page
            .execute(ContinueRequestParams::new(request_id.to_string()))
            .await
            .map_err(|e| {
                EngineError::Interception(format!("continue {} failed: {}", request_id, e))
            })?;
        Ok(())
    }

    async fn fulfill_request(
        &self,
        request_id: &str,
        response: SyntheticResponse,
    ) -> EngineResult<()> {
        let headers: Vec<HeaderEntry> = response
            .headers
            .into_iter()
            .map(|(name, value)| HeaderEntry { name, value })
            .collect();

        let params = FulfillRequestParams::builder()
            .request_id(request_id.to_string())
            .response_code(response.response_code as i64)
            .response_headers(headers)
            .body(response.body_b64)
            .build()
            .map_err(EngineError::Interception)?;

        self.page.execute(params).await.map_err(|e| {
            EngineError::Interception(format!("fulfill {} failed: {}", request_id, e))
        })?;
        Ok(())
    }
}
