//! Content cache configuration.

use std::{num::NonZeroUsize, path::PathBuf};

const DEFAULT_ROOT: &str = "md";
const DEFAULT_EXTENSION: &str = ".md";
const DEFAULT_CAPACITY: usize = 128;
const DEFAULT_INDEX_TITLE: &str = "index";

/// Construction-time parameters of the content cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory the content tree is served from.
    pub root: PathBuf,
    /// Extension marking a file as content, including the leading dot.
    pub extension: String,
    /// Maximum number of rendered documents kept in memory.
    pub capacity: usize,
    /// Title of a directory's landing document; excluded from the hot listing.
    pub index_title: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            extension: DEFAULT_EXTENSION.to_string(),
            capacity: DEFAULT_CAPACITY,
            index_title: DEFAULT_INDEX_TITLE.to_string(),
        }
    }
}

impl From<&crate::config::ContentSettings> for CacheConfig {
    fn from(settings: &crate::config::ContentSettings) -> Self {
        Self {
            root: settings.root.clone(),
            extension: settings.extension.clone(),
            capacity: settings.cache_capacity.get(),
            index_title: settings.index_title.clone(),
        }
    }
}

impl CacheConfig {
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity,
            ..Self::default()
        }
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// File name of a directory's landing document, e.g. `index.md`.
    pub fn index_file_name(&self) -> String {
        format!(
            "{}.{}",
            self.index_title,
            self.extension.trim_start_matches('.')
        )
    }
}
