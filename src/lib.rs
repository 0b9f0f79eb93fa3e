//! vidgrab core library
//!
//! Drives a remote Chrome instance to read item metadata from rendered
//! pages, then fetches each item's cover image and video with resumable,
//! atomically finalized transfers.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`retry`] - Bounded fixed-delay retry shared by every call site
//! - [`endpoint`] - Control channel discovery over HTTP+JSON
//! - [`render`] - Rendering capability and its Chrome DevTools backend
//! - [`extract`] - Collection expansion and per-item metadata
//! - [`download`] - Resumable transfers and on-disk layout
//! - [`pipeline`] - The per-identifier driver
//! - [`config`] - Configuration value object and TOML overrides

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod endpoint;
pub mod extract;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, PipelineConfig};
pub use download::{DownloadError, TransferClient, TransferSettings, TransferTarget};
pub use endpoint::{ControlEndpoint, EndpointError, EndpointResolver};
pub use extract::{ExtractError, Identifier, ItemMetadata};
pub use pipeline::{
    AbandonReason, AssetStatus, ItemOutcome, Mode, Pipeline, PipelineError, RunSummary,
};
pub use render::{CdpConnector, RenderError, Renderer, RendererConnector};
pub use retry::{FailureType, RetryDecision, RetryPolicy, Retryable};
