//! Shared User-Agent strings for endpoint discovery and transfer HTTP clients.
//!
//! Single source for the UA format so control-channel and asset traffic stay
//! consistent and easy to update.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/vidgrab";

/// Default User-Agent for asset transfers (identifies the tool).
#[must_use]
pub(crate) fn default_transfer_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("vidgrab/{version} (resumable-transfer; +{PROJECT_UA_URL})")
}

/// Default User-Agent for control endpoint discovery.
#[must_use]
pub(crate) fn default_endpoint_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("vidgrab/{version} (endpoint-discovery; +{PROJECT_UA_URL})")
}
