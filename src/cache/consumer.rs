//! Watch coordinator: turns filesystem events into cache and index mutations.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use metrics::counter;
use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use crate::lock::mutex_lock;

use super::events::{EventStream, FsEvent, FsOp};
use super::manager::ContentCacheManager;
use super::watcher::{WatchError, WatchRegistry};

const SOURCE: &str = "cache::consumer";
const METRIC_WATCH_EVENT: &str = "ink_watch_event_total";

/// Single consumer of the filesystem event stream.
///
/// Events are applied strictly one after another in arrival order, so a
/// remove followed by a create of the same path always leaves the cache in
/// the state the create implies.
pub struct WatchCoordinator {
    manager: Arc<ContentCacheManager>,
    registry: Arc<dyn WatchRegistry>,
    watched: Mutex<BTreeSet<PathBuf>>,
}

impl WatchCoordinator {
    pub fn new(manager: Arc<ContentCacheManager>, registry: Arc<dyn WatchRegistry>) -> Self {
        Self {
            manager,
            registry,
            watched: Mutex::new(BTreeSet::new()),
        }
    }

    /// Subscribe to the content root and every directory below it.
    ///
    /// Any failure to watch the root, or a directory that still exists, is
    /// returned. Directories removed while the walk is in progress are skipped.
    /// Returns the number of subscribed directories.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<usize, WatchError> {
        let root = self.manager.root().dir().to_path_buf();
        self.registry.watch(&root)?;
        mutex_lock(&self.watched, SOURCE, "start").insert(root.clone());

        let mut count = 1;
        for entry in WalkDir::new(&root).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable entry during startup walk");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            match self.registry.watch(entry.path()) {
                Ok(()) => {
                    mutex_lock(&self.watched, SOURCE, "start").insert(entry.into_path());
                    count += 1;
                }
                Err(err) if err.is_path_missing() => {
                    debug!(
                        path = %entry.path().display(),
                        "Directory vanished before it could be watched"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        info!(directories = count, root = %root.display(), "Content tree watched");
        Ok(count)
    }

    /// Consume `events` until the stream ends.
    ///
    /// Each event is applied on the blocking pool, since it may read and
    /// render files, and the next event is not taken until it completes.
    pub async fn run(self: Arc<Self>, mut events: EventStream) {
        while let Some(event) = events.next().await {
            let coordinator = Arc::clone(&self);
            if let Err(err) = tokio::task::spawn_blocking(move || coordinator.apply(&event)).await {
                error!(error = %err, "Watch event handler panicked");
            }
        }
        info!("Filesystem event stream closed; watch coordinator stopped");
    }

    /// Apply a single event.
    pub fn apply(&self, event: &FsEvent) {
        counter!(METRIC_WATCH_EVENT, "op" => event.op.as_str()).increment(1);
        info!(event = %event, "Filesystem event");

        match event.op {
            FsOp::Write | FsOp::Create => {
                self.refresh(&event.path);
                self.subscribe(&event.path);
                self.reload_index();
            }
            FsOp::Remove | FsOp::Rename => {
                self.forget(&event.path);
                self.unsubscribe(&event.path);
                self.reload_index();
            }
            FsOp::Permission => {
                info!(path = %event.path.display(), "Permission change ignored");
            }
        }
    }

    /// Paths currently subscribed, in sorted order.
    pub fn watched(&self) -> Vec<PathBuf> {
        mutex_lock(&self.watched, SOURCE, "watched")
            .iter()
            .cloned()
            .collect()
    }

    fn refresh(&self, path: &Path) {
        let root = self.manager.root();
        if !root.is_tracked(path) {
            return;
        }
        let Some(key) = root.key_for(path) else {
            return;
        };
        match self.manager.update(&key) {
            Ok(true) => info!(path = %key, "Cached content refreshed"),
            Ok(false) => {}
            Err(err) => warn!(path = %key, error = %err, "Cached content could not be refreshed"),
        }
    }

    fn forget(&self, path: &Path) {
        if let Some(key) = self.manager.root().key_for(path)
            && self.manager.invalidate(&key)
        {
            info!(path = %key, "Cached content invalidated");
        }
    }

    /// Watch `path`, and every directory under it when it is a directory that
    /// was created or moved in with contents.
    fn subscribe(&self, path: &Path) {
        self.watch_one(path);
        if !path.is_dir() {
            return;
        }
        for entry in WalkDir::new(path)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
        {
            self.watch_one(entry.path());
        }
    }

    fn watch_one(&self, path: &Path) {
        match self.registry.watch(path) {
            Ok(()) => {
                mutex_lock(&self.watched, SOURCE, "subscribe").insert(path.to_path_buf());
            }
            Err(err) => warn!(path = %path.display(), error = %err, "Failed to watch path"),
        }
    }

    fn unsubscribe(&self, path: &Path) {
        if let Err(err) = self.registry.unwatch(path) {
            debug!(path = %path.display(), error = %err, "Failed to unwatch path");
        }
        mutex_lock(&self.watched, SOURCE, "unsubscribe")
            .retain(|watched| !watched.starts_with(path));
    }

    fn reload_index(&self) {
        if let Err(err) = self.manager.reload_categories() {
            warn!(error = %err, "Category index left unchanged");
        }
    }
}
