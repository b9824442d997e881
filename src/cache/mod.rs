//! Ink content cache
//!
//! Keeps rendered markdown documents in a bounded LRU cache and keeps them
//! fresh from filesystem notifications:
//!
//! - **ContentCacheManager**: the facade request handlers call (`get`, `list`,
//!   `hot`, `categories`)
//! - **WatchCoordinator**: applies change events in arrival order (refresh,
//!   invalidate, directory index reload)
//!
//! ## Configuration
//!
//! Cache behavior is controlled via the `[content]` section of `ink.toml`:
//!
//! ```toml
//! [content]
//! root = "md"
//! extension = ".md"
//! cache_capacity = 128
//! index_title = "index"
//! ```

mod config;
mod consumer;
mod events;
mod index;
mod manager;
mod store;
mod watcher;

pub use config::CacheConfig;
pub use consumer::WatchCoordinator;
pub use events::{EventStream, FsEvent, FsOp};
pub use index::DirectoryIndex;
pub use manager::ContentCacheManager;
pub use store::{BoundedCache, EvictionHook};
pub use watcher::{NotifyWatcher, WatchError, WatchRegistry};
