//! Pipeline driver: resolves the control endpoint once, optionally expands a
//! collection, then walks every identifier through metadata extraction,
//! storage layout and the two asset transfers.
//!
//! Identifiers are processed one at a time. A failing identifier is logged
//! and counted; only an unresolvable control endpoint ends the run early.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::download::{DownloadError, StorageLayout, TransferClient};
use crate::endpoint::{EndpointError, EndpointResolver};
use crate::extract::{CollectionExtractor, Identifier, ItemExtractor};
use crate::render::RendererConnector;

/// What the positional identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A single item.
    Single,
    /// A collection whose listed items are processed in turn.
    List,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::List => "list",
        })
    }
}

/// Result of one asset slot (image or primary asset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    /// Transferred during this run.
    Downloaded,
    /// Destination already existed; nothing was fetched.
    AlreadyPresent,
    /// Every transfer attempt failed.
    Failed,
    /// The page did not offer a URL for this asset.
    NotOffered,
}

/// Why an identifier was dropped before any transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// No attempt produced a title and an asset URL.
    Metadata,
    /// The item directory could not be created.
    Storage,
    /// Another identifier of this run already claimed the same storage key.
    Collision,
}

/// Final state of one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Metadata and storage were usable; transfers were attempted.
    Completed {
        /// Sanitized title used for naming.
        storage_key: String,
        /// Cover image result.
        image: AssetStatus,
        /// Primary asset result.
        asset: AssetStatus,
    },
    /// Dropped before any transfer.
    Abandoned {
        /// Cause.
        reason: AbandonReason,
    },
}

/// Counters and per-identifier outcomes of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Identifiers handled.
    pub processed: usize,
    /// Identifiers whose primary asset is on disk.
    pub completed: usize,
    /// Identifiers whose primary asset transfer failed.
    pub failed: usize,
    /// Identifiers dropped before any transfer.
    pub abandoned: usize,
    /// Outcome per identifier, in processing order.
    pub outcomes: Vec<(Identifier, ItemOutcome)>,
}

impl RunSummary {
    fn record(&mut self, id: Identifier, outcome: ItemOutcome) {
        self.processed += 1;
        match &outcome {
            ItemOutcome::Completed {
                asset: AssetStatus::Downloaded | AssetStatus::AlreadyPresent,
                ..
            } => self.completed += 1,
            ItemOutcome::Completed { .. } => self.failed += 1,
            ItemOutcome::Abandoned { .. } => self.abandoned += 1,
        }
        self.outcomes.push((id, outcome));
    }

    /// Returns the outcome recorded for `id`.
    #[must_use]
    pub fn outcome(&self, id: &Identifier) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, outcome)| outcome)
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The control endpoint could not be resolved.
    #[error("control endpoint unavailable: {0}")]
    Endpoint(#[from] EndpointError),

    /// The transfer client could not be built.
    #[error("transfer client unavailable: {0}")]
    Transfer(#[from] DownloadError),
}

/// Sequences endpoint discovery, extraction and transfers.
pub struct Pipeline {
    config: PipelineConfig,
    connector: Arc<dyn RendererConnector>,
    transfer: TransferClient,
    layout: StorageLayout,
}

impl Pipeline {
    /// Builds a pipeline from `config`, creating renderers through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transfer`] if the transfer client cannot be built.
    pub fn new(
        config: PipelineConfig,
        connector: Arc<dyn RendererConnector>,
    ) -> Result<Self, PipelineError> {
        let transfer = TransferClient::new(config.transfer.clone())?;
        let layout = StorageLayout::new(config.output_dir.clone());
        Ok(Self {
            config,
            connector,
            transfer,
            layout,
        })
    }

    /// Returns the configuration the pipeline was built from.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Endpoint`] when the control endpoint cannot be
    /// resolved; no extraction happens in that case. Per-identifier failures
    /// are reported in the [`RunSummary`] instead.
    #[instrument(skip(self), fields(mode = %mode, identifier = %id))]
    pub async fn run(&self, mode: Mode, id: &Identifier) -> Result<RunSummary, PipelineError> {
        let endpoint_settings = &self.config.endpoint;
        let resolver = EndpointResolver::new(
            endpoint_settings.url.clone(),
            endpoint_settings.timeout,
            endpoint_settings.retry,
        )?;
        let endpoint = resolver.resolve().await?;
        let renderer = self.connector.connect(&endpoint);

        let ids = match mode {
            Mode::Single => vec![id.clone()],
            Mode::List => {
                CollectionExtractor::new(Arc::clone(&renderer), self.config.collection.clone())
                    .extract(id)
                    .await
            }
        };

        let mut summary = RunSummary::default();
        if ids.is_empty() {
            info!(collection = %id, "no items found");
            return Ok(summary);
        }

        let items = ItemExtractor::new(renderer, self.config.item.clone());
        let mut claimed = HashSet::new();
        let total = ids.len();
        for (index, item_id) in ids.into_iter().enumerate() {
            info!(identifier = %item_id, index = index + 1, total, "processing item");
            let outcome = self.process_item(&items, &item_id, &mut claimed).await;
            summary.record(item_id, outcome);
        }

        info!(
            processed = summary.processed,
            completed = summary.completed,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "all items processed"
        );
        Ok(summary)
    }

    async fn process_item(
        &self,
        items: &ItemExtractor,
        id: &Identifier,
        claimed: &mut HashSet<String>,
    ) -> ItemOutcome {
        let metadata = match items.extract(id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(identifier = %id, error = %e, "abandoning item: no usable metadata");
                return ItemOutcome::Abandoned {
                    reason: AbandonReason::Metadata,
                };
            }
        };

        let paths = self.layout.item_paths(&metadata.title);
        if claimed.contains(&paths.storage_key) {
            warn!(
                identifier = %id,
                storage_key = %paths.storage_key,
                "abandoning item: storage key already used by another item in this run"
            );
            return ItemOutcome::Abandoned {
                reason: AbandonReason::Collision,
            };
        }

        if let Err(e) = tokio::fs::create_dir_all(&paths.directory).await {
            warn!(
                identifier = %id,
                path = %paths.directory.display(),
                error = %e,
                "abandoning item: cannot create directory"
            );
            return ItemOutcome::Abandoned {
                reason: AbandonReason::Storage,
            };
        }
        claimed.insert(paths.storage_key.clone());

        let image = match metadata.image_url.as_deref() {
            Some(url) => self.fetch(id, "image", url, &paths.image).await,
            None => AssetStatus::NotOffered,
        };
        let asset = self
            .fetch(id, "asset", &metadata.asset_url, &paths.asset)
            .await;

        ItemOutcome::Completed {
            storage_key: paths.storage_key,
            image,
            asset,
        }
    }

    async fn fetch(
        &self,
        id: &Identifier,
        kind: &'static str,
        url: &str,
        destination: &Path,
    ) -> AssetStatus {
        let exists = match tokio::fs::try_exists(destination).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(
                    identifier = %id,
                    kind,
                    path = %destination.display(),
                    error = %e,
                    "cannot check for existing file, transferring anyway"
                );
                false
            }
        };
        if exists {
            info!(identifier = %id, kind, path = %destination.display(), "already exists, skipping");
            return AssetStatus::AlreadyPresent;
        }

        let target = self.transfer.target(url, destination);
        match self.transfer.transfer_with_retry(&target).await {
            Ok(_) => AssetStatus::Downloaded,
            Err(e) => {
                error!(identifier = %id, kind, url, error = %e, "transfer failed");
                AssetStatus::Failed
            }
        }
    }
}
