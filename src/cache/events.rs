//! Filesystem change events.
//!
//! Backend notifications are reduced to a path plus one of five operations
//! and delivered in arrival order over an unbounded channel.

use std::{fmt, path::PathBuf};

use notify::event::{EventKind, ModifyKind, RenameMode};
use tokio::sync::mpsc;

/// Kind of change observed on a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    Write,
    Create,
    Remove,
    Rename,
    Permission,
}

impl FsOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Rename => "rename",
            Self::Permission => "permission",
        }
    }
}

impl fmt::Display for FsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change to a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub op: FsOp,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, op: FsOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Translate a backend notification into zero or more events.
    ///
    /// Renames are split into the old path going away and the new path
    /// appearing. Access notifications carry no change and are dropped.
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        let notify::Event { kind, paths, .. } = event;
        match kind {
            EventKind::Create(_) => with_op(paths, FsOp::Create),
            EventKind::Remove(_) => with_op(paths, FsOp::Remove),
            EventKind::Modify(ModifyKind::Metadata(_)) => with_op(paths, FsOp::Permission),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => with_op(paths, FsOp::Rename),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => with_op(paths, FsOp::Create),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = paths.into_iter();
                let mut events = Vec::with_capacity(2);
                if let Some(from) = paths.next() {
                    events.push(Self::new(from, FsOp::Rename));
                }
                if let Some(to) = paths.next() {
                    events.push(Self::new(to, FsOp::Create));
                }
                events
            }
            // The backend could not tell which side of the rename this is.
            EventKind::Modify(ModifyKind::Name(_)) => paths
                .into_iter()
                .map(|path| {
                    let op = if path.exists() {
                        FsOp::Create
                    } else {
                        FsOp::Rename
                    };
                    Self::new(path, op)
                })
                .collect(),
            EventKind::Modify(_) => with_op(paths, FsOp::Write),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
        }
    }
}

impl fmt::Display for FsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.path.display())
    }
}

fn with_op(paths: Vec<PathBuf>, op: FsOp) -> Vec<FsEvent> {
    paths.into_iter().map(|path| FsEvent::new(path, op)).collect()
}

/// Receiving half of the event channel. Ends once every sender is dropped.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<FsEvent>,
}

impl EventStream {
    /// Create a connected sender and stream.
    pub fn channel() -> (mpsc::UnboundedSender<FsEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    pub async fn next(&mut self) -> Option<FsEvent> {
        self.rx.recv().await
    }
}
