//! Per-item metadata extraction from the detail page.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use super::{ExtractError, Identifier, page_url};
use crate::render::{RenderRequest, RenderedPage, Renderer, WaitSpec};
use crate::retry::RetryPolicy;

/// Default detail page template.
pub const DEFAULT_ITEM_URL_TEMPLATE: &str = "https://hanime1.me/download?v={id}";

/// Default title selector; also the synchronization element.
pub const DEFAULT_TITLE_SELECTOR: &str = "h3";

/// Default cover image selector.
pub const DEFAULT_IMAGE_SELECTOR: &str = "img.download-image";

/// Default download-table cell carrying the asset URL.
pub const DEFAULT_ASSET_SELECTOR: &str = "table.download-table tr:nth-child(2) td:nth-child(5) a";

/// Default settle period after the title became visible (2 seconds).
pub const DEFAULT_ITEM_SETTLE: Duration = Duration::from_secs(2);

/// Default upper bound for the title visibility wait (60 seconds).
pub const DEFAULT_VISIBLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default ceiling for one detail page render session (50 minutes).
pub const DEFAULT_ITEM_PAGE_TIMEOUT: Duration = Duration::from_secs(3000);

const TITLE_FIELD: &str = "title";
const IMAGE_FIELD: &str = "image_url";
const ASSET_FIELD: &str = "asset_url";

/// Configuration for [`ItemExtractor`].
#[derive(Debug, Clone)]
pub struct ItemSettings {
    /// Page URL template containing `{id}`.
    pub url_template: String,
    /// Title element; rendering waits for it to become visible.
    pub title_selector: String,
    /// Cover image element.
    pub image_selector: String,
    /// Attribute of the image element holding its URL.
    pub image_attribute: String,
    /// Element carrying the asset URL.
    pub asset_selector: String,
    /// Attribute of the asset element holding its URL.
    pub asset_attribute: String,
    /// Upper bound for the visibility wait.
    pub visible_timeout: Duration,
    /// Fixed wait after the title became visible.
    pub settle: Duration,
    /// Ceiling for one render session.
    pub page_timeout: Duration,
    /// Whether an empty title or asset URL consumes another attempt.
    pub retry_incomplete: bool,
    /// Attempt budget for the whole extraction.
    pub retry: RetryPolicy,
}

impl Default for ItemSettings {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_ITEM_URL_TEMPLATE.to_string(),
            title_selector: DEFAULT_TITLE_SELECTOR.to_string(),
            image_selector: DEFAULT_IMAGE_SELECTOR.to_string(),
            image_attribute: "src".to_string(),
            asset_selector: DEFAULT_ASSET_SELECTOR.to_string(),
            asset_attribute: "data-url".to_string(),
            visible_timeout: DEFAULT_VISIBLE_TIMEOUT,
            settle: DEFAULT_ITEM_SETTLE,
            page_timeout: DEFAULT_ITEM_PAGE_TIMEOUT,
            retry_incomplete: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Validated metadata of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMetadata {
    /// Raw title, trimmed. Never empty.
    pub title: String,
    /// Cover image URL, when the page offers one.
    pub image_url: Option<String>,
    /// Primary asset URL. Never empty.
    pub asset_url: String,
}

impl ItemMetadata {
    /// Validates extracted fields into usable metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Incomplete`] when the title or asset URL is
    /// empty; `retryable` is carried into the error.
    pub fn from_page(
        id: &Identifier,
        page: &RenderedPage,
        retryable: bool,
    ) -> Result<Self, ExtractError> {
        match (page.text(TITLE_FIELD), page.text(ASSET_FIELD)) {
            (Some(title), Some(asset_url)) => Ok(Self {
                title: title.to_string(),
                image_url: page.text(IMAGE_FIELD).map(str::to_string),
                asset_url: asset_url.to_string(),
            }),
            (title, asset_url) => Err(ExtractError::Incomplete {
                id: id.to_string(),
                title: title.unwrap_or_default().to_string(),
                asset_url: asset_url.unwrap_or_default().to_string(),
                retryable,
            }),
        }
    }
}

/// Reads [`ItemMetadata`] from an item's detail page.
pub struct ItemExtractor {
    renderer: Arc<dyn Renderer>,
    settings: ItemSettings,
}

impl ItemExtractor {
    /// Creates an extractor using `renderer`.
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>, settings: ItemSettings) -> Self {
        Self { renderer, settings }
    }

    /// Extracts metadata for `id`, re-rendering the whole page on each attempt.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's [`ExtractError`] when no attempt yielded
    /// a title and an asset URL.
    #[instrument(skip(self), fields(renderer = self.renderer.name()))]
    pub async fn extract(&self, id: &Identifier) -> Result<ItemMetadata, ExtractError> {
        let request = self.request_for(id);

        let metadata = self
            .settings
            .retry
            .run("extract item", |_| self.extract_once(id, &request))
            .await?;

        info!(
            %id,
            title = %metadata.title,
            image_url = metadata.image_url.as_deref().unwrap_or(""),
            asset_url = %metadata.asset_url,
            "download info"
        );
        Ok(metadata)
    }

    async fn extract_once(
        &self,
        id: &Identifier,
        request: &RenderRequest,
    ) -> Result<ItemMetadata, ExtractError> {
        let page = self
            .renderer
            .render(request)
            .await
            .map_err(|e| ExtractError::render(id.as_str(), e))?;
        ItemMetadata::from_page(id, &page, self.settings.retry_incomplete)
    }

    fn request_for(&self, id: &Identifier) -> RenderRequest {
        let settings = &self.settings;
        RenderRequest::new(
            page_url(&settings.url_template, id),
            WaitSpec::Visible {
                selector: settings.title_selector.clone(),
                timeout: settings.visible_timeout,
                settle: settings.settle,
            },
        )
        .text(TITLE_FIELD, &settings.title_selector)
        .attribute(IMAGE_FIELD, &settings.image_selector, &settings.image_attribute)
        .attribute(ASSET_FIELD, &settings.asset_selector, &settings.asset_attribute)
        .with_timeout(settings.page_timeout)
    }
}
