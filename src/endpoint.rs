//! Control-channel discovery over HTTP + JSON.
//!
//! The browser exposes a small JSON document (Chrome's `/json/version`)
//! naming the websocket address that drives it. [`EndpointResolver`] fetches
//! that document and extracts the `webSocketDebuggerUrl` field, retrying
//! under its own [`RetryPolicy`].
//!
//! # TLS
//!
//! Certificate verification is disabled for this client. The discovery
//! service is expected to run on loopback or a trusted LAN host, usually
//! with a self-signed certificate or plain HTTP. Do not reuse this client
//! for anything reachable from the public internet. Proxies are bypassed
//! as well.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::retry::{RetryPolicy, Retryable};
use crate::user_agent;

/// JSON field carrying the control-channel address.
pub const DEBUGGER_URL_FIELD: &str = "webSocketDebuggerUrl";

/// Default discovery URL for a locally running browser.
pub const DEFAULT_CONTROL_URL: &str = "http://localhost:9222/json/version";

/// Default per-attempt timeout for discovery requests (10 seconds).
pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of body bytes echoed into error messages.
const BODY_EXCERPT_LIMIT: usize = 512;

/// Live control-channel address, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEndpoint(String);

impl ControlEndpoint {
    /// Wraps an already-resolved address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from control-channel discovery.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The HTTP client could not be constructed.
    #[error("failed to build endpoint discovery client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Network-level failure (DNS, connection refused, TLS, body read).
    #[error("network error querying {url}: {source}")]
    Network {
        /// Discovery URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the per-attempt timeout.
    #[error("timeout querying {url}")]
    Timeout {
        /// Discovery URL.
        url: String,
    },

    /// The service answered with something other than 200.
    #[error("HTTP {status} querying {url}: {body}")]
    HttpStatus {
        /// Discovery URL.
        url: String,
        /// Returned status code.
        status: u16,
        /// Leading part of the response body.
        body: String,
    },

    /// The body was not a JSON document.
    #[error("invalid JSON from {url}: {source}; body: {body}")]
    InvalidJson {
        /// Discovery URL.
        url: String,
        /// Parse error.
        #[source]
        source: serde_json::Error,
        /// Leading part of the response body.
        body: String,
    },

    /// The JSON document has no address field.
    #[error("{field} missing in response from {url}")]
    MissingField {
        /// Discovery URL.
        url: String,
        /// Expected field name.
        field: &'static str,
    },

    /// The address field is present but empty.
    #[error("{field} is empty in response from {url}")]
    EmptyField {
        /// Discovery URL.
        url: String,
        /// Expected field name.
        field: &'static str,
    },
}

impl Retryable for EndpointError {}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: Option<String>,
}

/// Resolves the browser control channel from a discovery URL.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    client: Client,
    url: String,
    policy: RetryPolicy,
}

impl EndpointResolver {
    /// Creates a resolver for `url` with a per-attempt `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::ClientBuild`] when the HTTP client cannot be
    /// built.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, EndpointError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .no_proxy()
            .timeout(timeout)
            .user_agent(user_agent::default_endpoint_user_agent())
            .build()
            .map_err(EndpointError::ClientBuild)?;
        Ok(Self {
            client,
            url: url.into(),
            policy,
        })
    }

    /// Returns the discovery URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolves the control endpoint, retrying per the configured policy.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's [`EndpointError`] when every attempt failed.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn resolve(&self) -> Result<ControlEndpoint, EndpointError> {
        let endpoint = self
            .policy
            .run("resolve control endpoint", |_| self.fetch_once())
            .await?;
        info!(endpoint = %endpoint, "control endpoint resolved");
        Ok(endpoint)
    }

    /// Performs a single discovery attempt.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] for network failures, non-200 statuses,
    /// malformed JSON, or a missing/empty address field.
    pub async fn fetch_once(&self) -> Result<ControlEndpoint, EndpointError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        debug!(status = status.as_u16(), bytes = body.len(), "discovery response received");

        if status.as_u16() != 200 {
            return Err(EndpointError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        parse_debugger_url(&self.url, &body)
    }

    fn request_error(&self, error: reqwest::Error) -> EndpointError {
        if error.is_timeout() {
            EndpointError::Timeout {
                url: self.url.clone(),
            }
        } else {
            EndpointError::Network {
                url: self.url.clone(),
                source: error,
            }
        }
    }
}

/// Extracts the control-channel address from a discovery document.
///
/// # Errors
///
/// Returns [`EndpointError::InvalidJson`], [`EndpointError::MissingField`] or
/// [`EndpointError::EmptyField`].
pub fn parse_debugger_url(url: &str, body: &str) -> Result<ControlEndpoint, EndpointError> {
    let info: VersionInfo =
        serde_json::from_str(body).map_err(|source| EndpointError::InvalidJson {
            url: url.to_string(),
            source,
            body: excerpt(body),
        })?;

    match info.web_socket_debugger_url {
        None => Err(EndpointError::MissingField {
            url: url.to_string(),
            field: DEBUGGER_URL_FIELD,
        }),
        Some(address) if address.trim().is_empty() => Err(EndpointError::EmptyField {
            url: url.to_string(),
            field: DEBUGGER_URL_FIELD,
        }),
        Some(address) => Ok(ControlEndpoint::new(address.trim())),
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
