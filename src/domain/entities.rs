use std::sync::RwLock;

use time::OffsetDateTime;

use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "domain::entities";

/// A markdown document, either fully loaded or as a listing stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Cache key: `/`-separated path relative to the content root.
    pub path: String,
    pub title: String,
    /// Empty for documents directly under the root and for listing stubs.
    pub category: String,
    pub size: u64,
    /// Rendered body. Empty for listing stubs and summaries.
    pub html: String,
    pub modified: OffsetDateTime,
    /// Synthetic listing entry standing for a subdirectory.
    pub is_dir: bool,
}

impl Post {
    /// Metadata-only record used by directory listings.
    pub fn stub(
        path: impl Into<String>,
        title: impl Into<String>,
        size: u64,
        modified: OffsetDateTime,
        is_dir: bool,
    ) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            category: String::new(),
            size,
            html: String::new(),
            modified,
            is_dir,
        }
    }

    /// Lightweight copy without the rendered body.
    pub fn summary(&self) -> Self {
        Self {
            path: self.path.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            size: self.size,
            html: String::new(),
            modified: self.modified,
            is_dir: self.is_dir,
        }
    }
}

/// Shared handle to a cached post.
///
/// The cache hands out clones of one `Arc<CachedPost>` per key; change events
/// overwrite the fields behind it, so every holder observes the refreshed
/// content without re-fetching.
#[derive(Debug)]
pub struct CachedPost {
    post: RwLock<Post>,
}

impl CachedPost {
    pub fn new(post: Post) -> Self {
        Self {
            post: RwLock::new(post),
        }
    }

    /// Clone of the current contents.
    pub fn snapshot(&self) -> Post {
        rw_read(&self.post, SOURCE, "snapshot").clone()
    }

    /// Borrow the current contents for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&Post) -> R) -> R {
        f(&rw_read(&self.post, SOURCE, "with"))
    }

    /// Overwrite body, timestamp and size with a freshly loaded copy of the same file.
    pub(crate) fn refresh(&self, fresh: Post) {
        let mut post = rw_write(&self.post, SOURCE, "refresh");
        post.html = fresh.html;
        post.modified = fresh.modified;
        post.size = fresh.size;
        post.title = fresh.title;
        post.category = fresh.category;
    }
}

/// Immediate subdirectory of the content root, used for navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    /// Path relative to the content root.
    pub path: String,
}
