//! Disk loading of markdown documents.

use std::{fs::File, io::Read, sync::Arc};

use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use crate::domain::{
    entities::Post,
    error::ContentError,
    paths::{ContentRoot, resolve},
};

use super::render::MarkdownRenderer;

const METRIC_CACHE_LOAD: &str = "ink_cache_load_total";

/// Reads a document from the content tree and renders it.
pub struct ContentLoader {
    root: ContentRoot,
    renderer: Arc<dyn MarkdownRenderer>,
}

impl ContentLoader {
    pub fn new(root: ContentRoot, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        Self { root, renderer }
    }

    pub fn root(&self) -> &ContentRoot {
        &self.root
    }

    /// Load and render the document stored under cache key `key`.
    pub fn load(&self, key: &str) -> Result<Post, ContentError> {
        let path = self.root.fs_path(key);
        let mut file = File::open(&path).map_err(|err| ContentError::io(&path, err))?;
        let metadata = file
            .metadata()
            .map_err(|err| ContentError::io(&path, err))?;
        let modified = metadata
            .modified()
            .map(OffsetDateTime::from)
            .map_err(|err| ContentError::io(&path, err))?;

        let capacity = usize::try_from(metadata.len()).unwrap_or(0).saturating_add(512);
        let mut source = Vec::with_capacity(capacity);
        file.read_to_end(&mut source)
            .map_err(|err| ContentError::io(&path, err))?;

        let anchored = self.root.anchored(key);
        let (category, title) = resolve(&anchored);
        let html = self.renderer.render(&source);

        counter!(METRIC_CACHE_LOAD).increment(1);
        debug!(path = key, bytes = source.len(), "Content loaded from disk");

        Ok(Post {
            path: key.to_string(),
            title: title.to_string(),
            category: category.to_string(),
            size: metadata.len(),
            html,
            modified,
            is_dir: false,
        })
    }
}
