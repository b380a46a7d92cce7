//! Error kinds surfaced by the config store.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No host with this name in the searched scope.
    #[error("host '{name}' not found")]
    NotFound { name: String },

    /// Adding would duplicate a name inside one file.
    #[error("host '{name}' already exists in {}", .path.display())]
    AlreadyExists { name: String, path: PathBuf },

    /// Move target is the file the host already lives in.
    #[error("host '{name}' is already in the target config file {}", .path.display())]
    AlreadyInTarget { name: String, path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed `Include` pattern. Only ever reported as a skipped include.
    #[error("invalid include pattern {pattern}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("cannot determine home directory")]
    NoHomeDir,

    /// The pre-mutation backup failed, so the file was left untouched.
    #[error("failed to back up {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
