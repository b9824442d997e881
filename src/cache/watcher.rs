//! Filesystem notification backend.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, warn};

use crate::lock::mutex_lock;

use super::events::{EventStream, FsEvent};

const SOURCE: &str = "cache::watcher";

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create filesystem watcher: {0}")]
    Create(#[source] notify::Error),
    #[error("failed to watch `{}`: {source}", path.display())]
    Backend {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("filesystem watcher is closed")]
    Closed,
}

impl WatchError {
    /// True when the path disappeared before it could be (un)subscribed.
    pub fn is_path_missing(&self) -> bool {
        match self {
            Self::Backend { source, .. } => match &source.kind {
                notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => true,
                notify::ErrorKind::Io(err) => err.kind() == io::ErrorKind::NotFound,
                _ => false,
            },
            Self::Create(_) | Self::Closed => false,
        }
    }
}

/// Per-path subscription to change notifications.
///
/// Subscriptions are not recursive; directories are subscribed one by one.
pub trait WatchRegistry: Send + Sync {
    fn watch(&self, path: &Path) -> Result<(), WatchError>;
    fn unwatch(&self, path: &Path) -> Result<(), WatchError>;
}

/// [`WatchRegistry`] backed by the platform's native notification API.
pub struct NotifyWatcher {
    inner: Mutex<Option<RecommendedWatcher>>,
}

impl NotifyWatcher {
    /// Create the backend and the stream its events are delivered on.
    pub fn new() -> Result<(Self, EventStream), WatchError> {
        let (tx, stream) = EventStream::channel();
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    for event in FsEvent::from_notify(event) {
                        if tx.send(event).is_err() {
                            debug!("Event stream dropped; discarding notification");
                            return;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "Filesystem watcher reported an error"),
            },
            Config::default(),
        )
        .map_err(WatchError::Create)?;

        Ok((
            Self {
                inner: Mutex::new(Some(watcher)),
            },
            stream,
        ))
    }

    /// Stop the backend. Its event stream ends once pending events are drained.
    pub fn close(&self) {
        if mutex_lock(&self.inner, SOURCE, "close").take().is_some() {
            debug!("Filesystem watcher closed");
        }
    }
}

impl WatchRegistry for NotifyWatcher {
    fn watch(&self, path: &Path) -> Result<(), WatchError> {
        let mut inner = mutex_lock(&self.inner, SOURCE, "watch");
        let watcher = inner.as_mut().ok_or(WatchError::Closed)?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Backend {
                path: path.to_path_buf(),
                source,
            })
    }

    fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        let mut inner = mutex_lock(&self.inner, SOURCE, "unwatch");
        let watcher = inner.as_mut().ok_or(WatchError::Closed)?;
        watcher.unwatch(path).map_err(|source| WatchError::Backend {
            path: path.to_path_buf(),
            source,
        })
    }
}
