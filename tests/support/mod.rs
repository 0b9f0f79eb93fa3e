//! Shared fixtures for integration tests: a scripted renderer standing in
//! for the browser, and helpers for zero-delay configurations.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vidgrab_core::config::PipelineConfig;
use vidgrab_core::endpoint::ControlEndpoint;
use vidgrab_core::render::{
    NodeAttributes, RenderError, RenderRequest, RenderedPage, Renderer, RendererConnector,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WATCH_TEMPLATE: &str = "https://site.test/watch?v={id}";
pub const DOWNLOAD_TEMPLATE: &str = "https://site.test/download?v={id}";
pub const DEBUGGER_URL: &str = "ws://127.0.0.1:9222/devtools/browser/test-session";

/// One scripted render result.
#[derive(Debug, Clone)]
pub enum Scripted {
    Page(RenderedPage),
    Fail(&'static str),
}

/// Renderer returning scripted pages per URL.
///
/// Each URL has a queue of results; the last one repeats once the queue is
/// down to a single entry. Unknown URLs fail.
#[derive(Debug, Default)]
pub struct FakeRenderer {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, results: Vec<Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), results.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
        self.calls.lock().unwrap().push(request.url.clone());

        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.get_mut(&request.url).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };

        match next {
            Some(Scripted::Page(page)) => Ok(page),
            Some(Scripted::Fail(message)) => Err(RenderError::navigation(&request.url, message)),
            None => Err(RenderError::navigation(&request.url, "no script for url")),
        }
    }
}

/// Connector handing out the same [`FakeRenderer`] and recording endpoints.
#[derive(Debug)]
pub struct FakeConnector {
    renderer: Arc<FakeRenderer>,
    endpoints: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(renderer: Arc<FakeRenderer>) -> Arc<Self> {
        Arc::new(Self {
            renderer,
            endpoints: Mutex::new(Vec::new()),
        })
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }
}

impl RendererConnector for FakeConnector {
    fn connect(&self, endpoint: &ControlEndpoint) -> Arc<dyn Renderer> {
        self.endpoints
            .lock()
            .unwrap()
            .push(endpoint.as_str().to_string());
        self.renderer.clone()
    }
}

/// Detail page as the item extractor reads it.
pub fn item_page(title: &str, image_url: Option<&str>, asset_url: &str) -> Scripted {
    Scripted::Page(
        RenderedPage::new()
            .with_value("title", Some(title))
            .with_value("image_url", image_url)
            .with_value("asset_url", Some(asset_url)),
    )
}

/// Collection page listing `ids` as overlay anchors, plus one decoy anchor.
pub fn collection_page(ids: &[&str]) -> Scripted {
    let mut nodes: Vec<NodeAttributes> = ids
        .iter()
        .map(|id| anchor("overlay", &format!("https://site.test/watch?v={id}")))
        .collect();
    nodes.push(anchor("title", "https://site.test/watch?v=decoy"));
    Scripted::Page(RenderedPage::new().with_nodes("links", nodes))
}

fn anchor(class: &str, href: &str) -> NodeAttributes {
    let mut node = NodeAttributes::new();
    node.insert("class".to_string(), class.to_string());
    node.insert("href".to_string(), href.to_string());
    node
}

pub fn watch_url(id: &str) -> String {
    WATCH_TEMPLATE.replace("{id}", id)
}

pub fn download_url(id: &str) -> String {
    DOWNLOAD_TEMPLATE.replace("{id}", id)
}

/// Default configuration with zero retry delay, test templates, no screenshots.
pub fn fast_config(output_dir: &Path, endpoint_url: &str) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.output_dir = output_dir.to_path_buf();
    config.endpoint.url = endpoint_url.to_string();
    config.endpoint.timeout = Duration::from_secs(2);
    config.collection.url_template = WATCH_TEMPLATE.to_string();
    config.collection.screenshot_dir = None;
    config.item.url_template = DOWNLOAD_TEMPLATE.to_string();
    config.transfer.timeout = Duration::from_secs(10);
    config.set_retry(None, Some(Duration::ZERO));
    config
}

/// Mounts the DevTools version document at `/json/version`.
pub async fn mount_endpoint(server: &MockServer) -> String {
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Browser": "HeadlessChrome/131.0.0.0",
            "webSocketDebuggerUrl": DEBUGGER_URL,
        })))
        .mount(server)
        .await;
    format!("{}/json/version", server.uri())
}
