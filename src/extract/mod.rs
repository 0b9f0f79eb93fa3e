//! Page extraction on top of the [`Renderer`](crate::render::Renderer) capability.
//!
//! - [`CollectionExtractor`] - expands a collection page into item identifiers
//! - [`ItemExtractor`] - reads title and asset URLs from an item's detail page
//! - [`Identifier`] - opaque token naming an item or a collection

mod collection;
mod error;
mod item;

pub use collection::{CollectionExtractor, CollectionSettings, parse_collection_links};
pub use error::ExtractError;
pub use item::{ItemExtractor, ItemMetadata, ItemSettings};

use std::fmt;

/// Placeholder substituted with the identifier in page URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Opaque token naming one item or one collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Creates an identifier from trimmed, non-empty input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Substitutes the percent-encoded identifier into `template`.
#[must_use]
pub fn page_url(template: &str, id: &Identifier) -> String {
    template.replace(ID_PLACEHOLDER, &urlencoding::encode(id.as_str()))
}
