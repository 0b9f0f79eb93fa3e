//! Resumable file transfer and on-disk layout.
//!
//! # Features
//!
//! - Streaming downloads into a `.tmp` staging file
//! - Byte-range resume from whatever a previous attempt left behind
//! - Atomic rename to the destination once the body is complete
//! - Title-derived item layout (`<first token>/<title>.jpg|.mp4`)
//!
//! # Example
//!
//! ```no_run
//! use vidgrab_core::download::{TransferClient, TransferSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TransferClient::new(TransferSettings::default())?;
//! let target = client.target("https://example.com/v.mp4", "./Foo/Foo Bar.mp4");
//! let outcome = client.transfer_with_retry(&target).await?;
//! println!("Downloaded: {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod filename;

pub use client::{TransferClient, TransferOutcome, TransferSettings, TransferTarget};
pub use constants::{CONNECT_TIMEOUT, STAGING_SUFFIX, TRANSFER_TIMEOUT};
pub use error::DownloadError;
pub use filename::{
    ASSET_EXTENSION, IMAGE_EXTENSION, ItemPaths, StorageLayout, sanitize_title,
    storage_directory_name,
};
