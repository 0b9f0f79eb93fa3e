//! Constants for the download module (timeouts, staging).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ceiling for a whole transfer attempt (10 hours).
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(36_000);

/// Suffix appended to the destination path while a transfer is staged.
pub const STAGING_SUFFIX: &str = ".tmp";
