//! Concurrency-safe facade over the content cache and the directory index.

use std::{
    convert::Infallible,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::application::{loader::ContentLoader, render::MarkdownRenderer};
use crate::domain::{
    entities::{CachedPost, Category, Post},
    error::ContentError,
    paths::ContentRoot,
};
use crate::lock::{rw_read, rw_write};

use super::config::CacheConfig;
use super::index::DirectoryIndex;
use super::store::BoundedCache;

const SOURCE: &str = "cache::manager";
const METRIC_CACHE_HIT: &str = "ink_cache_hit_total";
const METRIC_CACHE_MISS: &str = "ink_cache_miss_total";
const METRIC_CACHE_EVICT: &str = "ink_cache_evict_total";
const METRIC_INDEX_RELOAD_MS: &str = "ink_index_reload_ms";

/// Cache and index share one lock: index reloads and in-place refreshes are
/// exclusive with reads, while concurrent reads proceed in parallel.
struct CacheState {
    posts: BoundedCache<String, Arc<CachedPost>>,
    index: DirectoryIndex,
}

/// Entry point for the serving layer and the watch coordinator.
///
/// A miss in [`ContentCacheManager::get`] loads from disk without holding the
/// lock. Two requests racing on the same uncached key may therefore both load
/// and render it; the first to insert wins the slot and the other returns the
/// winner's handle. Any invalidation or update that lands while a miss is
/// loading bumps the mutation epoch, and a load that overlapped such a change
/// is handed back to its caller without being cached, so a reader can never
/// reinstate content the watcher has already superseded.
pub struct ContentCacheManager {
    config: CacheConfig,
    loader: ContentLoader,
    state: RwLock<CacheState>,
    epoch: AtomicU64,
}

impl ContentCacheManager {
    /// Open the content root, build the initial directory index and create an empty cache.
    pub fn new(
        config: CacheConfig,
        renderer: Arc<dyn MarkdownRenderer>,
    ) -> Result<Self, ContentError> {
        let root = ContentRoot::open(&config.root, &config.extension)?;
        let mut index = DirectoryIndex::default();
        index.reload(root.dir())?;
        let posts = BoundedCache::with_eviction_hook(
            config.capacity_non_zero(),
            Box::new(|path: &String, _post: &Arc<CachedPost>| {
                counter!(METRIC_CACHE_EVICT).increment(1);
                debug!(path = %path, "Content left the cache");
            }),
        );

        Ok(Self {
            config,
            loader: ContentLoader::new(root, renderer),
            state: RwLock::new(CacheState { posts, index }),
            epoch: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn root(&self) -> &ContentRoot {
        self.loader.root()
    }

    /// Return the cached document for `path`, loading it on a miss.
    pub fn get(&self, path: &str) -> Result<Arc<CachedPost>, ContentError> {
        {
            let state = rw_read(&self.state, SOURCE, "get");
            if let Some(post) = state.posts.get(path) {
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(path, "Content cache hit");
                return Ok(post);
            }
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        let observed_epoch = self.epoch.load(Ordering::Acquire);
        let fresh = Arc::new(CachedPost::new(self.loader.load(path)?));

        let state = rw_write(&self.state, SOURCE, "get.insert");
        if let Some(winner) = state.posts.get(path) {
            debug!(path, "Concurrent load already cached this content");
            return Ok(winner);
        }
        if self.epoch.load(Ordering::Acquire) != observed_epoch {
            debug!(path, "Content changed during load; serving without caching");
            return Ok(fresh);
        }
        state.posts.put(path.to_string(), Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop `path` from the cache. Returns whether an entry was removed.
    pub fn invalidate(&self, path: &str) -> bool {
        let state = rw_write(&self.state, SOURCE, "invalidate");
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let removed = state.posts.remove(path).is_some();
        if removed {
            debug!(path, "Content invalidated");
        }
        removed
    }

    /// Reload `path` in place if it is cached; documents nobody has requested are left alone.
    ///
    /// Returns whether a cached entry was refreshed. If the reload fails the
    /// entry is dropped so stale content is not served.
    pub fn update(&self, path: &str) -> Result<bool, ContentError> {
        {
            let state = rw_write(&self.state, SOURCE, "update.mark");
            self.epoch.fetch_add(1, Ordering::AcqRel);
            if !state.posts.contains(path) {
                return Ok(false);
            }
        }

        let fresh = match self.loader.load(path) {
            Ok(post) => post,
            Err(err) => {
                self.invalidate(path);
                return Err(err);
            }
        };

        let state = rw_write(&self.state, SOURCE, "update.apply");
        match state.posts.get(path) {
            Some(cached) => {
                cached.refresh(fresh);
                debug!(path, "Content refreshed in place");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Metadata-only listing of every directory and tracked document under `dir`.
    ///
    /// Entries are visited depth-first in file-name order. Nothing is rendered
    /// and the cache is not consulted.
    pub fn list(&self, dir: &str) -> Result<Vec<Post>, ContentError> {
        let root = self.root();
        let base = root.fs_path(dir);

        let mut posts = Vec::new();
        for entry in WalkDir::new(&base)
            .min_depth(1)
            .sort_by_file_name()
            .follow_links(false)
        {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(base.as_path()).to_path_buf();
                ContentError::io(path, err.into())
            })?;
            let is_dir = entry.file_type().is_dir();
            if !is_dir && !root.is_tracked(entry.path()) {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|err| ContentError::io(entry.path(), err.into()))?;
            let modified = metadata
                .modified()
                .map(OffsetDateTime::from)
                .map_err(|err| ContentError::io(entry.path(), err))?;
            let key = root.key_for(entry.path()).unwrap_or_default();
            let title = entry.file_name().to_string_lossy().into_owned();

            posts.push(Post::stub(key, title, metadata.len(), modified, is_dir));
        }
        Ok(posts)
    }

    /// Summaries of every cached document except directory landing pages.
    ///
    /// Ordered by cache recency, most recently used first.
    pub fn hot(&self) -> Vec<Post> {
        let state = rw_read(&self.state, SOURCE, "hot");
        let index_title = self.config.index_title.as_str();

        let mut posts = Vec::new();
        let Ok(()) = state.posts.walk(|_, post| {
            post.with(|post| {
                if post.title != index_title {
                    posts.push(post.summary());
                }
            });
            Ok::<_, Infallible>(())
        });
        posts
    }

    /// Current category snapshot.
    pub fn categories(&self) -> Arc<[Category]> {
        rw_read(&self.state, SOURCE, "categories").index.list()
    }

    /// Rescan the content root and swap in a new category snapshot.
    ///
    /// The scan runs into a detached index, so readers keep the previous
    /// snapshot until the swap and keep it entirely if the scan fails.
    #[instrument(skip(self))]
    pub fn reload_categories(&self) -> Result<usize, ContentError> {
        let started_at = Instant::now();
        let mut fresh = DirectoryIndex::default();
        let count = match fresh.reload(self.root().dir()) {
            Ok(categories) => categories.len(),
            Err(err) => {
                warn!(error = %err, "Directory index reload failed; keeping previous snapshot");
                return Err(err);
            }
        };

        rw_write(&self.state, SOURCE, "reload_categories").index = fresh;

        histogram!(METRIC_INDEX_RELOAD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(count, "Directory index reloaded");
        Ok(count)
    }

    /// Whether `path` is currently cached. Does not affect recency.
    pub fn contains(&self, path: &str) -> bool {
        rw_read(&self.state, SOURCE, "contains").posts.contains(path)
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        rw_read(&self.state, SOURCE, "len").posts.len()
    }

    pub fn is_empty(&self) -> bool {
        rw_read(&self.state, SOURCE, "is_empty").posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::Path,
        sync::{
            Barrier,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        thread,
    };

    use super::*;

    /// Renderer that counts invocations, i.e. disk loads.
    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl MarkdownRenderer for CountingRenderer {
        fn render(&self, source: &[u8]) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("<p>{}</p>", String::from_utf8_lossy(source))
        }
    }

    /// Renderer that parks its first render between two barriers so a test
    /// can mutate the cache while a miss is loading.
    struct GatedRenderer {
        armed: AtomicBool,
        entered: Barrier,
        release: Barrier,
    }

    impl GatedRenderer {
        fn new() -> Self {
            Self {
                armed: AtomicBool::new(true),
                entered: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl MarkdownRenderer for GatedRenderer {
        fn render(&self, source: &[u8]) -> String {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.wait();
                self.release.wait();
            }
            format!("<p>{}</p>", String::from_utf8_lossy(source))
        }
    }

    /// Start a `get("a.md")` miss, run `mutate` while it is loading, then let it finish.
    fn race_miss_with(
        mutate: impl FnOnce(&ContentCacheManager),
    ) -> (Arc<ContentCacheManager>, Post) {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.md"), "v1").expect("write");
        let renderer = Arc::new(GatedRenderer::new());
        let manager = Arc::new(
            ContentCacheManager::new(
                CacheConfig::new(dir.path(), 4),
                Arc::clone(&renderer) as Arc<dyn MarkdownRenderer>,
            )
            .expect("manager opens"),
        );

        let racer = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.get("a.md").expect("racing get").snapshot())
        };

        renderer.entered.wait();
        mutate(&manager);
        renderer.release.wait();

        let post = racer.join().expect("racer thread");
        (manager, post)
    }

    fn manager(dir: &Path, capacity: usize) -> (ContentCacheManager, Arc<CountingRenderer>) {
        let renderer = Arc::new(CountingRenderer::default());
        let manager = ContentCacheManager::new(
            CacheConfig::new(dir, capacity),
            Arc::clone(&renderer) as Arc<dyn MarkdownRenderer>,
        )
        .expect("manager opens");
        (manager, renderer)
    }

    #[test]
    fn second_get_is_served_from_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.md"), "alpha").expect("write");
        let (manager, renderer) = manager(dir.path(), 4);

        let first = manager.get("a.md").expect("first get");
        let second = manager.get("a.md").expect("second get");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.snapshot(), second.snapshot());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_overlapping_an_update_is_served_but_not_cached() {
        let (manager, post) = race_miss_with(|manager| {
            assert!(!manager.update("a.md").expect("update"));
        });

        assert_eq!(post.html, "<p>v1</p>");
        assert!(!manager.contains("a.md"));
    }

    #[test]
    fn load_overlapping_an_invalidate_is_served_but_not_cached() {
        let (manager, post) = race_miss_with(|manager| {
            assert!(!manager.invalidate("a.md"));
        });

        assert_eq!(post.html, "<p>v1</p>");
        assert!(manager.is_empty());
    }

    #[test]
    fn load_without_overlapping_changes_is_cached() {
        let (manager, post) = race_miss_with(|_| {});

        assert_eq!(post.html, "<p>v1</p>");
        assert!(manager.contains("a.md"));
    }

    #[test]
    fn update_refreshes_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.md"), "alpha").expect("write");
        let (manager, _) = manager(dir.path(), 4);

        let before = manager.get("a.md").expect("get");
        fs::write(dir.path().join("a.md"), "alpha, revised").expect("rewrite");
        assert!(manager.update("a.md").expect("update"));

        let after = manager.get("a.md").expect("get");
        assert!(Arc::ptr_eq(&before, &after));
        let post = before.snapshot();
        assert_eq!(post.size, 14);
        assert_eq!(post.html, "<p>alpha, revised</p>");
    }

    #[test]
    fn update_of_uncached_path_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.md"), "alpha").expect("write");
        let (manager, renderer) = manager(dir.path(), 4);

        assert!(!manager.update("a.md").expect("update"));
        assert!(manager.is_empty());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_update_drops_the_stale_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.md"), "alpha").expect("write");
        let (manager, _) = manager(dir.path(), 4);

        manager.get("a.md").expect("get");
        fs::remove_file(dir.path().join("a.md")).expect("remove");

        let err = manager.update("a.md").expect_err("update fails");
        assert!(err.is_not_found());
        assert!(!manager.contains("a.md"));
    }

    #[test]
    fn invalidate_forces_a_fresh_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.md"), "alpha").expect("write");
        let (manager, renderer) = manager(dir.path(), 4);

        manager.get("a.md").expect("get");
        assert!(manager.invalidate("a.md"));
        assert!(!manager.invalidate("a.md"));
        manager.get("a.md").expect("get");

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn capacity_bounds_the_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["a.md", "b.md", "c.md"] {
            fs::write(dir.path().join(name), name).expect("write");
        }
        let (manager, _) = manager(dir.path(), 2);

        manager.get("a.md").expect("get");
        manager.get("b.md").expect("get");
        manager.get("a.md").expect("get");
        manager.get("c.md").expect("get");

        assert_eq!(manager.len(), 2);
        assert!(manager.contains("a.md"));
        assert!(!manager.contains("b.md"));
        assert!(manager.contains("c.md"));
    }

    #[test]
    fn hot_skips_landing_pages_and_follows_recency() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("notes")).expect("mkdir");
        fs::write(dir.path().join("notes/index.md"), "landing").expect("write");
        fs::write(dir.path().join("notes/one.md"), "one").expect("write");
        fs::write(dir.path().join("two.md"), "two").expect("write");
        let (manager, _) = manager(dir.path(), 8);

        manager.get("notes/one.md").expect("get");
        manager.get("notes/index.md").expect("get");
        manager.get("two.md").expect("get");

        let hot = manager.hot();
        let titles: Vec<_> = hot.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["two", "one"]);
        assert_eq!(hot[1].category, "notes");
        assert!(hot.iter().all(|p| p.html.is_empty()));
    }

    #[test]
    fn list_returns_stubs_for_directories_and_tracked_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("notes")).expect("mkdir");
        fs::write(dir.path().join("a.md"), "alpha").expect("write");
        fs::write(dir.path().join("ignored.txt"), "skip").expect("write");
        let (manager, renderer) = manager(dir.path(), 4);

        let listing = manager.list("").expect("list");

        assert_eq!(listing.len(), 2);
        let file = listing.iter().find(|p| !p.is_dir).expect("file stub");
        let folder = listing.iter().find(|p| p.is_dir).expect("dir stub");
        assert_eq!(file.path, "a.md");
        assert_eq!(file.title, "a.md");
        assert_eq!(file.size, 5);
        assert_eq!(folder.path, "notes");
        assert!(listing.iter().all(|p| p.html.is_empty() && p.category.is_empty()));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        assert!(manager.is_empty());
    }

    #[test]
    fn list_recurses_into_subdirectories() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("notes/deep")).expect("mkdir");
        fs::write(dir.path().join("notes/deep/x.md"), "x").expect("write");
        let (manager, _) = manager(dir.path(), 4);

        let listing = manager.list("notes").expect("list");
        let paths: Vec<_> = listing.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["notes/deep", "notes/deep/x.md"]);
    }

    #[test]
    fn list_of_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (manager, _) = manager(dir.path(), 4);
        assert!(manager.list("nope").expect_err("missing").is_not_found());
    }

    #[test]
    fn categories_follow_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("rust")).expect("mkdir");
        let (manager, _) = manager(dir.path(), 4);
        assert_eq!(manager.categories().len(), 1);

        fs::create_dir(dir.path().join("zig")).expect("mkdir");
        assert_eq!(manager.reload_categories().expect("reload"), 2);
        let names: Vec<_> = manager
            .categories()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, ["rust", "zig"]);
    }

    #[test]
    fn failed_category_reload_keeps_the_previous_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("rust")).expect("mkdir");
        let (manager, _) = manager(dir.path(), 4);

        fs::remove_dir_all(manager.root().dir()).expect("remove root");
        assert!(manager.reload_categories().expect_err("root gone").is_not_found());
        assert_eq!(manager.categories().len(), 1);
    }
}
