//! Error types for the render module.

use std::time::Duration;

use thiserror::Error;

use crate::retry::Retryable;

/// Errors raised while driving the browser for one page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Could not attach to the browser behind the control endpoint.
    #[error("failed to connect to browser at {endpoint}: {message}")]
    Connect {
        /// Control endpoint address.
        endpoint: String,
        /// Backend error text.
        message: String,
    },

    /// Opening or navigating the page failed.
    #[error("navigation to {url} failed: {message}")]
    Navigation {
        /// Target page.
        url: String,
        /// Backend error text.
        message: String,
    },

    /// The synchronization element never became visible.
    #[error("element {selector} not visible after {timeout:?}")]
    WaitTimeout {
        /// Awaited selector.
        selector: String,
        /// Configured visibility timeout.
        timeout: Duration,
    },

    /// A structural query could not be evaluated.
    #[error("query {selector} failed: {message}")]
    Query {
        /// Queried selector.
        selector: String,
        /// Backend error text.
        message: String,
    },

    /// Screenshot capture failed.
    #[error("screenshot of {url} failed: {message}")]
    Screenshot {
        /// Target page.
        url: String,
        /// Backend error text.
        message: String,
    },

    /// The whole render session exceeded its ceiling.
    #[error("rendering {url} exceeded {timeout:?}")]
    SessionTimeout {
        /// Target page.
        url: String,
        /// Session ceiling.
        timeout: Duration,
    },
}

impl RenderError {
    /// Creates a connection error.
    pub fn connect(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Creates a navigation error.
    pub fn navigation(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a query error.
    pub fn query(selector: impl Into<String>, message: impl ToString) -> Self {
        Self::Query {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Creates a screenshot error.
    pub fn screenshot(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Screenshot {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

impl Retryable for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_wait_timeout_display() {
        let error = RenderError::WaitTimeout {
            selector: "h3".to_string(),
            timeout: Duration::from_secs(30),
        };
        let msg = error.to_string();
        assert!(msg.contains("h3"), "Expected selector in: {msg}");
        assert!(msg.contains("30s"), "Expected timeout in: {msg}");
    }

    #[test]
    fn test_render_error_connect_display() {
        let error = RenderError::connect("ws://127.0.0.1:9222/devtools/browser/x", "refused");
        let msg = error.to_string();
        assert!(msg.contains("ws://127.0.0.1:9222"), "Expected endpoint in: {msg}");
        assert!(msg.contains("refused"), "Expected cause in: {msg}");
    }
}
