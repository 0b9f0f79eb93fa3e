//! Error types for the extract module.

use thiserror::Error;

use crate::render::RenderError;
use crate::retry::{FailureType, Retryable};

/// Errors from item extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The rendering collaborator failed for this attempt.
    #[error("rendering failed for {id}: {source}")]
    Render {
        /// Item identifier.
        id: String,
        /// Underlying render error.
        #[source]
        source: RenderError,
    },

    /// The page rendered, but the title or the asset URL was empty.
    #[error("incomplete metadata for {id}: title {title:?}, asset URL {asset_url:?}")]
    Incomplete {
        /// Item identifier.
        id: String,
        /// Title as extracted (possibly empty).
        title: String,
        /// Asset URL as extracted (possibly empty).
        asset_url: String,
        /// Whether another attempt should be made.
        retryable: bool,
    },
}

impl ExtractError {
    /// Creates a render error.
    pub fn render(id: impl Into<String>, source: RenderError) -> Self {
        Self::Render {
            id: id.into(),
            source,
        }
    }
}

impl Retryable for ExtractError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::Render { .. } => FailureType::Transient,
            Self::Incomplete { retryable, .. } => {
                if *retryable {
                    FailureType::Transient
                } else {
                    FailureType::Permanent
                }
            }
        }
    }
}
