use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure to produce content from the on-disk tree.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("path `{path}` escapes the content root")]
    InvalidPath { path: String },
}

impl ContentError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// True when the underlying file or directory does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Self::InvalidPath { .. } => false,
        }
    }
}
