//! Error types for trash reclamation
//!
//! Library code returns [`TrashError`]; the CLI wraps it in `anyhow` with context.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = TrashError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TrashError {
    /// Entry vanished between listing and use (another eraser got there first)
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Free space query failed; aborts the pass for that location only
    #[error("failed to query free space for {}: {reason}", path.display())]
    DiskStat { path: PathBuf, reason: String },

    #[error("failed to read mount table {}: {source}", path.display())]
    MountTable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("no config directory available on this platform")]
    NoConfigDir,

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TrashError {
    /// Map a raw I/O error into the narrowest matching category.
    pub fn classify(err: io::Error, op: &'static str, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => TrashError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => TrashError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => TrashError::Io {
                op,
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TrashError::NotFound { .. })
    }
}
