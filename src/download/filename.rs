//! Title sanitization and on-disk layout for downloaded items.
//!
//! The sanitized title is the storage identity of an item: it names both the
//! item directory (its first whitespace-delimited token) and the two files
//! inside it. Idempotence checks therefore compare sanitized names, never
//! raw titles.

use std::path::{Component, Path, PathBuf};

/// File extension of the cover image.
pub const IMAGE_EXTENSION: &str = "jpg";

/// File extension of the primary asset.
pub const ASSET_EXTENSION: &str = "mp4";

/// Makes a title safe to use as a single path component.
///
/// Path separators (`/`, `\`) and control characters become `_`; a result
/// that would still be interpreted as `.` or `..` has its dots replaced.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Directory name for an item: first whitespace-delimited token of the
/// sanitized title.
#[must_use]
pub fn storage_directory_name(sanitized_title: &str) -> String {
    let token = sanitized_title
        .split_whitespace()
        .next()
        .unwrap_or(sanitized_title);
    sanitize_title(token)
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Paths derived for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPaths {
    /// Sanitized title; the item's storage key.
    pub storage_key: String,
    /// Item directory.
    pub directory: PathBuf,
    /// Cover image destination.
    pub image: PathBuf,
    /// Asset destination.
    pub asset: PathBuf,
}

/// Root under which item directories are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the layout root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derives directory and file paths from a raw title.
    #[must_use]
    pub fn item_paths(&self, title: &str) -> ItemPaths {
        let storage_key = sanitize_title(title);
        let directory = self.root.join(storage_directory_name(&storage_key));
        let image = directory.join(format!("{storage_key}.{IMAGE_EXTENSION}"));
        let asset = directory.join(format!("{storage_key}.{ASSET_EXTENSION}"));
        ItemPaths {
            storage_key,
            directory,
            image,
            asset,
        }
    }
}
