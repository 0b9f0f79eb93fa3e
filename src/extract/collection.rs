//! Collection (playlist) expansion.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::{Identifier, page_url};
use crate::download::sanitize_title;
use crate::render::{NodeAttributes, RenderRequest, Renderer, WaitSpec};
use crate::retry::RetryPolicy;

/// Default collection page template.
pub const DEFAULT_COLLECTION_URL_TEMPLATE: &str = "https://hanime1.me/watch?v={id}";

/// Default selector for playlist anchors.
pub const DEFAULT_ANCHOR_SELECTOR: &str = "#video-playlist-wrapper a";

/// Default `class` value marking item links.
pub const DEFAULT_MARKER_CLASS: &str = "overlay";

/// Default settle period after navigation (5 seconds).
pub const DEFAULT_COLLECTION_SETTLE: Duration = Duration::from_secs(5);

/// Default ceiling for one collection render session (5 minutes).
pub const DEFAULT_COLLECTION_PAGE_TIMEOUT: Duration = Duration::from_secs(300);

const LINKS_FIELD: &str = "links";

/// Configuration for [`CollectionExtractor`].
#[derive(Debug, Clone)]
pub struct CollectionSettings {
    /// Page URL template containing `{id}`.
    pub url_template: String,
    /// Selector matching candidate anchors.
    pub anchor_selector: String,
    /// Exact `class` value of anchors that point at items.
    pub marker_class: String,
    /// Fixed wait after navigation.
    pub settle: Duration,
    /// Ceiling for one render session.
    pub page_timeout: Duration,
    /// Where to write the diagnostic screenshot; `None` skips it.
    pub screenshot_dir: Option<PathBuf>,
    /// Attempt budget for the render call.
    pub retry: RetryPolicy,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_COLLECTION_URL_TEMPLATE.to_string(),
            anchor_selector: DEFAULT_ANCHOR_SELECTOR.to_string(),
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
            settle: DEFAULT_COLLECTION_SETTLE,
            page_timeout: DEFAULT_COLLECTION_PAGE_TIMEOUT,
            screenshot_dir: Some(PathBuf::from(".")),
            retry: RetryPolicy::default(),
        }
    }
}

/// Expands a collection identifier into the identifiers it lists.
pub struct CollectionExtractor {
    renderer: Arc<dyn Renderer>,
    settings: CollectionSettings,
}

impl CollectionExtractor {
    /// Creates an extractor using `renderer`.
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>, settings: CollectionSettings) -> Self {
        Self { renderer, settings }
    }

    /// Returns the identifiers listed on the collection page.
    ///
    /// Exhausting the retry budget is not an error: the collection is then
    /// reported as empty.
    #[instrument(skip(self), fields(renderer = self.renderer.name()))]
    pub async fn extract(&self, collection: &Identifier) -> Vec<Identifier> {
        let request = self.request_for(collection);

        let page = match self
            .settings
            .retry
            .run("extract collection", |_| self.renderer.render(&request))
            .await
        {
            Ok(page) => page,
            Err(error) => {
                warn!(
                    %collection,
                    attempts = self.settings.retry.max_attempts(),
                    error = %error,
                    "failed to read collection, treating it as empty"
                );
                return Vec::new();
            }
        };

        if let (Some(dir), Some(bytes)) = (&self.settings.screenshot_dir, page.screenshot()) {
            let path = screenshot_path(dir, collection);
            if let Err(error) = tokio::fs::write(&path, bytes).await {
                warn!(path = %path.display(), error = %error, "failed to save collection screenshot");
            }
        }

        let items = parse_collection_links(page.nodes(LINKS_FIELD), &self.settings.marker_class);
        info!(%collection, items = items.len(), "collection acquired");
        items
    }

    fn request_for(&self, collection: &Identifier) -> RenderRequest {
        let request = RenderRequest::new(
            page_url(&self.settings.url_template, collection),
            WaitSpec::Settle(self.settings.settle),
        )
        .all_attributes(LINKS_FIELD, &self.settings.anchor_selector, ["class", "href"])
        .with_timeout(self.settings.page_timeout);

        if self.settings.screenshot_dir.is_some() {
            request.with_screenshot()
        } else {
            request
        }
    }
}

/// Screenshot file for `collection`, kept directly inside `dir`.
fn screenshot_path(dir: &Path, collection: &Identifier) -> PathBuf {
    dir.join(format!(
        "playlist_screenshot_{}.png",
        sanitize_title(collection.as_str())
    ))
}

/// Applies the link filtering rule to rendered anchors.
///
/// Keeps anchors whose `class` equals `marker_class`, splits `href` on `=`
/// and takes the second segment. The result is deduplicated and sorted.
#[must_use]
pub fn parse_collection_links(nodes: &[NodeAttributes], marker_class: &str) -> Vec<Identifier> {
    nodes
        .iter()
        .filter(|node| node.get("class").is_some_and(|class| class == marker_class))
        .filter_map(|node| node.get("href"))
        .filter_map(|href| href.split('=').nth(1))
        .filter_map(Identifier::parse)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn anchor(class: Option<&str>, href: Option<&str>) -> NodeAttributes {
        let mut node = NodeAttributes::new();
        if let Some(class) = class {
            node.insert("class".to_string(), class.to_string());
        }
        if let Some(href) = href {
            node.insert("href".to_string(), href.to_string());
        }
        node
    }

    fn ids(values: &[&str]) -> Vec<Identifier> {
        values.iter().map(|v| Identifier::parse(v).unwrap()).collect()
    }

    #[test]
    fn test_screenshot_path_stays_inside_directory() {
        let dir = Path::new("/tmp/shots");
        let collection = Identifier::parse("a/../b").unwrap();
        assert_eq!(
            screenshot_path(dir, &collection),
            dir.join("playlist_screenshot_a_.._b.png")
        );
    }

    #[test]
    fn test_parse_collection_links_filters_marker_class() {
        let nodes = vec![
            anchor(Some("overlay"), Some("https://example.com/watch?v=111")),
            anchor(Some("title"), Some("https://example.com/watch?v=222")),
            anchor(Some("overlay active"), Some("https://example.com/watch?v=333")),
        ];
        assert_eq!(parse_collection_links(&nodes, "overlay"), ids(&["111"]));
    }

    #[test]
    fn test_parse_collection_links_deduplicates() {
        let nodes = vec![
            anchor(Some("overlay"), Some("/watch?v=222")),
            anchor(Some("overlay"), Some("/watch?v=111")),
            anchor(Some("overlay"), Some("/watch?v=222")),
        ];
        assert_eq!(parse_collection_links(&nodes, "overlay"), ids(&["111", "222"]));
    }

    #[test]
    fn test_parse_collection_links_takes_second_segment_only() {
        let nodes = vec![anchor(Some("overlay"), Some("/watch?v=444&list=9"))];
        // Only the first `=` split matters; everything up to the next `=` is kept.
        assert_eq!(parse_collection_links(&nodes, "overlay"), ids(&["444&list"]));
    }

    #[test]
    fn test_parse_collection_links_skips_missing_or_bare_href() {
        let nodes = vec![
            anchor(Some("overlay"), None),
            anchor(Some("overlay"), Some("/watch")),
            anchor(Some("overlay"), Some("/watch?v=")),
            anchor(None, Some("/watch?v=555")),
        ];
        assert!(parse_collection_links(&nodes, "overlay").is_empty());
    }
}
