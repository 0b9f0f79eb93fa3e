//! Page rendering capability used by the extractors.
//!
//! The browser is an external collaborator. Everything the pipeline needs
//! from it is captured by one narrow operation: render a URL, synchronize
//! according to a [`WaitSpec`], and return the requested fields.
//!
//! # Architecture
//!
//! - [`Renderer`] - Async trait implemented by browser backends and test fakes
//! - [`RendererConnector`] - Builds a renderer once the control endpoint is known
//! - [`RenderRequest`] - URL, wait strategy, named field queries, screenshot flag
//! - [`RenderedPage`] - Named field values plus the optional screenshot
//! - [`CdpRenderer`] - Chrome DevTools Protocol backend

mod cdp;
mod error;

pub use cdp::{CdpConnector, CdpRenderer, DEFAULT_PAGE_TIMEOUT};
pub use error::RenderError;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::endpoint::ControlEndpoint;

/// Attribute map of one matched element.
pub type NodeAttributes = HashMap<String, String>;

/// How the renderer synchronizes with the page before querying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitSpec {
    /// Sleep for a fixed period after navigation.
    Settle(Duration),

    /// Wait until `selector` is visible, then sleep for `settle`.
    Visible {
        /// Element that must become visible.
        selector: String,
        /// Upper bound for the visibility wait.
        timeout: Duration,
        /// Extra pause after the element became visible.
        settle: Duration,
    },
}

/// A single structural query against the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldQuery {
    /// Text content of the first element matching `selector`.
    Text {
        /// CSS selector.
        selector: String,
    },

    /// One attribute of the first element matching `selector`.
    Attribute {
        /// CSS selector.
        selector: String,
        /// Attribute name.
        attribute: String,
    },

    /// Selected attributes of every element matching `selector`.
    AllAttributes {
        /// CSS selector.
        selector: String,
        /// Attribute names to collect per element.
        attributes: Vec<String>,
    },
}

/// Value produced for one [`FieldQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Result of a `Text` or `Attribute` query; `None` when nothing matched.
    Single(Option<String>),
    /// Result of an `AllAttributes` query, in document order.
    Nodes(Vec<NodeAttributes>),
}

/// Everything the renderer is asked to do for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Page to navigate to.
    pub url: String,
    /// Synchronization strategy after navigation.
    pub wait: WaitSpec,
    /// Named queries, evaluated in order.
    pub fields: Vec<(String, FieldQuery)>,
    /// Whether to capture a full-page screenshot after the queries.
    pub capture_screenshot: bool,
    /// Session ceiling for this page; the renderer's default applies when unset.
    pub timeout: Option<Duration>,
}

impl RenderRequest {
    /// Creates a request with no queries.
    #[must_use]
    pub fn new(url: impl Into<String>, wait: WaitSpec) -> Self {
        Self {
            url: url.into(),
            wait,
            fields: Vec::new(),
            capture_screenshot: false,
            timeout: None,
        }
    }

    /// Adds a text query.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, selector: impl Into<String>) -> Self {
        self.fields.push((
            name.into(),
            FieldQuery::Text {
                selector: selector.into(),
            },
        ));
        self
    }

    /// Adds a single-attribute query.
    #[must_use]
    pub fn attribute(
        mut self,
        name: impl Into<String>,
        selector: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.fields.push((
            name.into(),
            FieldQuery::Attribute {
                selector: selector.into(),
                attribute: attribute.into(),
            },
        ));
        self
    }

    /// Adds a query collecting `attributes` from every matching element.
    #[must_use]
    pub fn all_attributes<I, S>(
        mut self,
        name: impl Into<String>,
        selector: impl Into<String>,
        attributes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.push((
            name.into(),
            FieldQuery::AllAttributes {
                selector: selector.into(),
                attributes: attributes.into_iter().map(Into::into).collect(),
            },
        ));
        self
    }

    /// Requests a full-page screenshot.
    #[must_use]
    pub fn with_screenshot(mut self) -> Self {
        self.capture_screenshot = true;
        self
    }

    /// Bounds the whole render session for this page.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Field values and side artifacts of one successful render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPage {
    fields: HashMap<String, FieldValue>,
    screenshot: Option<Vec<u8>>,
}

impl RenderedPage {
    /// Creates an empty page result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the value for a named field.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Builder-style variant of [`insert`](Self::insert) for single values.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.insert(name, FieldValue::Single(value.map(str::to_string)));
        self
    }

    /// Builder-style variant of [`insert`](Self::insert) for node lists.
    #[must_use]
    pub fn with_nodes(mut self, name: impl Into<String>, nodes: Vec<NodeAttributes>) -> Self {
        self.insert(name, FieldValue::Nodes(nodes));
        self
    }

    /// Attaches screenshot bytes.
    #[must_use]
    pub fn with_screenshot(mut self, bytes: Vec<u8>) -> Self {
        self.screenshot = Some(bytes);
        self
    }

    /// Returns a single value, trimmed, or `None` when absent or blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FieldValue::Single(Some(value)) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// Returns the matched nodes for a field, empty when absent.
    #[must_use]
    pub fn nodes(&self, name: &str) -> &[NodeAttributes] {
        match self.fields.get(name) {
            Some(FieldValue::Nodes(nodes)) => nodes,
            _ => &[],
        }
    }

    /// Returns the captured screenshot, if any.
    #[must_use]
    pub fn screenshot(&self) -> Option<&[u8]> {
        self.screenshot.as_deref()
    }
}

/// Browser backend able to render a page and answer structural queries.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Arc<dyn Renderer>`, which lets the pipeline run against a fake in tests.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Returns the backend's name for logging.
    fn name(&self) -> &str;

    /// Renders `request.url` and evaluates every field query.
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError>;
}

/// Creates a [`Renderer`] bound to a resolved control endpoint.
pub trait RendererConnector: Send + Sync {
    /// Returns a renderer driving the browser behind `endpoint`.
    fn connect(&self, endpoint: &ControlEndpoint) -> Arc<dyn Renderer>;
}
