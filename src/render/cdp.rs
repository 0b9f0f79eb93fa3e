//! Chrome DevTools Protocol renderer.
//!
//! Each [`CdpRenderer::render`] call attaches to the remote browser, opens a
//! fresh tab, runs the request, and closes the tab again. The browser process
//! itself is never closed: it belongs to whoever exposed the control endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use chromiumoxide::Page;
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use super::{
    FieldQuery, FieldValue, NodeAttributes, RenderError, RenderRequest, RenderedPage, Renderer,
    RendererConnector, WaitSpec,
};
use crate::endpoint::ControlEndpoint;

/// Polling interval while waiting for an element to become visible.
const VISIBILITY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default ceiling for one render session (50 minutes).
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(3000);

/// Renderer backed by a remote Chrome instance.
#[derive(Debug, Clone)]
pub struct CdpRenderer {
    endpoint: ControlEndpoint,
    page_timeout: Duration,
}

impl CdpRenderer {
    /// Creates a renderer for `endpoint`, bounding each session by `page_timeout`.
    #[must_use]
    pub fn new(endpoint: ControlEndpoint, page_timeout: Duration) -> Self {
        Self {
            endpoint,
            page_timeout,
        }
    }

    async fn render_session(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        let (browser, mut handler) = Browser::connect(self.endpoint.as_str())
            .await
            .map_err(|e| RenderError::connect(self.endpoint.as_str(), e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    trace!(error = %error, "devtools handler event error");
                }
            }
        });

        let result = drive_page(&browser, request).await;
        handler_task.abort();
        result
    }
}

#[async_trait]
impl Renderer for CdpRenderer {
    fn name(&self) -> &str {
        "cdp"
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        let ceiling = request.timeout.unwrap_or(self.page_timeout);
        tokio::time::timeout(ceiling, self.render_session(request))
            .await
            .map_err(|_| RenderError::SessionTimeout {
                url: request.url.clone(),
                timeout: ceiling,
            })?
    }
}

/// Connector producing [`CdpRenderer`]s with a shared session ceiling.
#[derive(Debug, Clone)]
pub struct CdpConnector {
    page_timeout: Duration,
}

impl CdpConnector {
    /// Creates a connector whose renderers use `page_timeout`.
    #[must_use]
    pub fn new(page_timeout: Duration) -> Self {
        Self { page_timeout }
    }
}

impl Default for CdpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_TIMEOUT)
    }
}

impl RendererConnector for CdpConnector {
    fn connect(&self, endpoint: &ControlEndpoint) -> Arc<dyn Renderer> {
        Arc::new(CdpRenderer::new(endpoint.clone(), self.page_timeout))
    }
}

async fn drive_page(browser: &Browser, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| RenderError::navigation(&request.url, e))?;

    let result = query_page(&page, request).await;

    if let Err(error) = page.close().await {
        debug!(error = %error, "failed to close tab");
    }
    result
}

async fn query_page(page: &Page, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
    page.goto(request.url.as_str())
        .await
        .map_err(|e| RenderError::navigation(&request.url, e))?;

    match &request.wait {
        WaitSpec::Settle(settle) => tokio::time::sleep(*settle).await,
        WaitSpec::Visible {
            selector,
            timeout,
            settle,
        } => {
            wait_visible(page, selector, *timeout).await?;
            tokio::time::sleep(*settle).await;
        }
    }

    let mut rendered = RenderedPage::new();
    for (name, query) in &request.fields {
        let value = evaluate_query(page, query).await?;
        trace!(field = %name, ?value, "field extracted");
        rendered.insert(name.clone(), value);
    }

    if request.capture_screenshot {
        let bytes = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| RenderError::screenshot(&request.url, e))?;
        rendered = rendered.with_screenshot(bytes);
    }

    Ok(rendered)
}

async fn wait_visible(page: &Page, selector: &str, timeout: Duration) -> Result<(), RenderError> {
    let script = visibility_script(selector);
    let deadline = Instant::now() + timeout;

    loop {
        let visible = page
            .evaluate(script.as_str())
            .await
            .ok()
            .and_then(|result| result.into_value::<bool>().ok())
            .unwrap_or(false);
        if visible {
            debug!(selector, "element visible");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RenderError::WaitTimeout {
                selector: selector.to_string(),
                timeout,
            });
        }
        tokio::time::sleep(VISIBILITY_POLL_INTERVAL).await;
    }
}

fn visibility_script(selector: &str) -> String {
    let selector = serde_json::Value::from(selector).to_string();
    format!(
        "(() => {{ const el = document.querySelector({selector}); \
         if (!el) return false; \
         const rect = el.getBoundingClientRect(); \
         const style = window.getComputedStyle(el); \
         return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden'; }})()"
    )
}

async fn evaluate_query(page: &Page, query: &FieldQuery) -> Result<FieldValue, RenderError> {
    match query {
        FieldQuery::Text { selector } => {
            let Ok(element) = page.find_element(selector.as_str()).await else {
                return Ok(FieldValue::Single(None));
            };
            let text = element
                .inner_text()
                .await
                .map_err(|e| RenderError::query(selector, e))?;
            Ok(FieldValue::Single(text))
        }
        FieldQuery::Attribute {
            selector,
            attribute,
        } => {
            let Ok(element) = page.find_element(selector.as_str()).await else {
                return Ok(FieldValue::Single(None));
            };
            let value = element
                .attribute(attribute.as_str())
                .await
                .map_err(|e| RenderError::query(selector, e))?;
            Ok(FieldValue::Single(value))
        }
        FieldQuery::AllAttributes {
            selector,
            attributes,
        } => {
            let elements = page
                .find_elements(selector.as_str())
                .await
                .map_err(|e| RenderError::query(selector, e))?;
            let mut nodes = Vec::with_capacity(elements.len());
            for element in &elements {
                let mut node = NodeAttributes::new();
                for name in attributes {
                    if let Some(value) = element
                        .attribute(name.as_str())
                        .await
                        .map_err(|e| RenderError::query(selector, e))?
                    {
                        node.insert(name.clone(), value);
                    }
                }
                nodes.push(node);
            }
            Ok(FieldValue::Nodes(nodes))
        }
    }
}
