//! Resumable HTTP transfer into a staging file.
//!
//! A transfer accumulates bytes in `<destination><suffix>` and only renames
//! it to the destination once the body has been copied completely. A staging
//! file left behind by a failed attempt (or a previous run) is the resume
//! point for the next one.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, STAGING_SUFFIX, TRANSFER_TIMEOUT};
use super::error::DownloadError;
use crate::retry::RetryPolicy;
use crate::user_agent;

/// Configuration for [`TransferClient`].
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Ceiling for one whole attempt, body included.
    pub timeout: Duration,
    /// Suffix appended to the destination for the staging file.
    pub staging_suffix: String,
    /// Attempt budget for [`TransferClient::transfer_with_retry`].
    pub retry: RetryPolicy,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            timeout: TRANSFER_TIMEOUT,
            staging_suffix: STAGING_SUFFIX.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// One remote resource and where it ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTarget {
    /// Remote URL.
    pub source_url: String,
    /// Final path; exists only after a completed transfer.
    pub destination: PathBuf,
    /// Staging path (`destination` + suffix).
    pub partial: PathBuf,
}

impl TransferTarget {
    /// Creates a target whose staging file is `destination` + `staging_suffix`.
    #[must_use]
    pub fn new(
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
        staging_suffix: &str,
    ) -> Self {
        let destination = destination.into();
        let mut partial = OsString::from(destination.as_os_str());
        partial.push(staging_suffix);
        Self {
            source_url: source_url.into(),
            destination,
            partial: PathBuf::from(partial),
        }
    }
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Final path.
    pub path: PathBuf,
    /// Size of the finished file.
    pub bytes_total: u64,
    /// Bytes received during the successful attempt.
    pub bytes_fetched: u64,
    /// Whether the attempt continued an existing staging file.
    pub resumed: bool,
}

/// HTTP client performing resumable transfers.
///
/// Created once per run and reused for every transfer so connections are
/// pooled.
#[derive(Debug, Clone)]
pub struct TransferClient {
    client: Client,
    settings: TransferSettings,
}

impl TransferClient {
    /// Builds the client. Proxies are never used and bodies are never
    /// decompressed, so byte offsets always match the remote resource.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(settings: TransferSettings) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .no_proxy()
            .gzip(false)
            .user_agent(user_agent::default_transfer_user_agent())
            .build()
            .map_err(DownloadError::ClientBuild)?;
        Ok(Self { client, settings })
    }

    /// Returns the client settings.
    #[must_use]
    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Creates a target using the configured staging suffix.
    #[must_use]
    pub fn target(
        &self,
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> TransferTarget {
        TransferTarget::new(source_url, destination, &self.settings.staging_suffix)
    }

    /// Runs [`transfer`](Self::transfer) under the configured retry policy.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once the budget is exhausted.
    #[instrument(skip(self, target), fields(url = %target.source_url, path = %target.destination.display()))]
    pub async fn transfer_with_retry(
        &self,
        target: &TransferTarget,
    ) -> Result<TransferOutcome, DownloadError> {
        self.settings
            .retry
            .run("transfer", |_| self.transfer(target))
            .await
    }

    /// Performs one transfer attempt.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails, the
    /// server answers with anything but a usable 200/206, the body cannot
    /// be copied, or the staged size contradicts the announced size. The
    /// staging file is kept in every case except an oversize one.
    pub async fn transfer(&self, target: &TransferTarget) -> Result<TransferOutcome, DownloadError> {
        let url = target.source_url.as_str();
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let offset = staged_len(&target.partial).await?;
        debug!(offset, partial = %target.partial.display(), "starting transfer attempt");

        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::from_request(url, e))?;

        let status = response.status();
        let (start, expected_total) = match status {
            StatusCode::PARTIAL_CONTENT => {
                let range = content_range(&response);
                let start = range.and_then(|r| r.start);
                if start != Some(offset) {
                    return Err(DownloadError::RangeMismatch {
                        url: url.to_string(),
                        expected: offset,
                        actual: start,
                    });
                }
                (offset, range.and_then(|r| r.total))
            }
            StatusCode::OK => {
                if offset > 0 {
                    warn!(url, offset, "server ignored range request, restarting from byte 0");
                }
                (0, content_length(&response))
            }
            StatusCode::RANGE_NOT_SATISFIABLE if offset > 0 => {
                match content_range(&response).and_then(|r| r.total) {
                    Some(total) if total == offset => {
                        debug!(url, offset, "staging file already complete");
                        sync_staging(&target.partial).await?;
                        return finalize(target, offset, 0, true).await;
                    }
                    Some(total) if total < offset => {
                        return Err(discard_oversize(&target.partial, total, offset).await);
                    }
                    _ => return Err(DownloadError::http_status(url, status.as_u16())),
                }
            }
            other => return Err(DownloadError::http_status(url, other.as_u16())),
        };

        let resumed = start > 0;
        let mut file = open_staging(&target.partial, resumed).await?;
        let fetched = stream_to_file(&mut file, response, url, &target.partial).await?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io(target.partial.clone(), e))?;
        drop(file);

        let staged = start.saturating_add(fetched);
        if let Some(expected) = expected_total {
            if staged > expected {
                return Err(discard_oversize(&target.partial, expected, staged).await);
            }
            if staged < expected {
                return Err(DownloadError::integrity(target.partial.clone(), expected, staged));
            }
        }

        finalize(target, staged, fetched, resumed).await
    }
}

/// Removes a staging file that holds more bytes than the remote resource.
async fn discard_oversize(partial: &Path, expected: u64, staged: u64) -> DownloadError {
    warn!(
        path = %partial.display(),
        expected,
        staged,
        "staging file larger than remote resource, discarding"
    );
    if let Err(error) = tokio::fs::remove_file(partial).await {
        warn!(path = %partial.display(), error = %error, "failed to remove staging file");
    }
    DownloadError::integrity(partial.to_path_buf(), expected, staged)
}

async fn staged_len(partial: &Path) -> Result<u64, DownloadError> {
    match tokio::fs::metadata(partial).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(DownloadError::io(partial.to_path_buf(), e)),
    }
}

async fn sync_staging(partial: &Path) -> Result<(), DownloadError> {
    let file = File::open(partial)
        .await
        .map_err(|e| DownloadError::io(partial.to_path_buf(), e))?;
    file.sync_all()
        .await
        .map_err(|e| DownloadError::io(partial.to_path_buf(), e))
}

async fn open_staging(partial: &Path, append: bool) -> Result<File, DownloadError> {
    let mut options = OpenOptions::new();
    if append {
        options.append(true);
    } else {
        options.write(true).create(true).truncate(true);
    }
    options
        .open(partial)
        .await
        .map_err(|e| DownloadError::io(partial.to_path_buf(), e))
}

async fn finalize(
    target: &TransferTarget,
    bytes_total: u64,
    bytes_fetched: u64,
    resumed: bool,
) -> Result<TransferOutcome, DownloadError> {
    tokio::fs::rename(&target.partial, &target.destination)
        .await
        .map_err(|e| DownloadError::io(target.destination.clone(), e))?;

    info!(
        path = %target.destination.display(),
        bytes = bytes_total,
        fetched = bytes_fetched,
        resumed,
        "download complete"
    );

    Ok(TransferOutcome {
        path: target.destination.clone(),
        bytes_total,
        bytes_fetched,
        resumed,
    })
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                // Keep what already arrived; it is the next resume point.
                if let Err(flush_error) = writer.flush().await {
                    debug!(path = %file_path.display(), error = %flush_error, "failed to flush staging file");
                }
                return Err(DownloadError::from_request(url, e));
            }
        };

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn content_range(response: &reqwest::Response) -> Option<ContentRange> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range)
}

/// Parsed `Content-Range` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    /// First byte position; `None` for the unsatisfied form `*`.
    start: Option<u64>,
    /// Complete length; `None` when the server sent `*`.
    total: Option<u64>,
}

/// Parses `bytes 4-9/10`, `bytes 4-9/*` and `bytes */10`.
fn parse_content_range(value: &str) -> Option<ContentRange> {
    let spec = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = spec.split_once('/')?;

    let total = match total.trim() {
        "*" => None,
        n => Some(n.parse::<u64>().ok()?),
    };

    let start = match range.trim() {
        "*" => None,
        r => {
            let (first, last) = r.split_once('-')?;
            let first = first.trim().parse::<u64>().ok()?;
            let last = last.trim().parse::<u64>().ok()?;
            if last < first {
                return None;
            }
            Some(first)
        }
    };

    Some(ContentRange { start, total })
}
