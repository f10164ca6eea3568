//! Error types for document operations.

use std::io;
use std::path::{Path, PathBuf};

/// Error reported by caller-supplied logic: an update transformer or an
/// iteration callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from [`DocumentStore`](crate::DocumentStore) operations.
///
/// Filesystem failures are sorted by what the caller can do about them: an
/// absent document is always `NotFound`, undecodable content is always
/// `Parse`, and a failed write is always `Write` (a missing parent directory
/// included).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("document not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("document {} is not valid JSON for the requested type: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("value for {} could not be encoded as JSON: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("no lock key for {}: {source}", path.display())]
    Lock { path: PathBuf, source: io::Error },

    #[error("caller-supplied logic failed: {0}")]
    Transformer(#[source] BoxError),
}

impl Error {
    /// True when the target did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::NotFound { path }
            | Error::Parse { path, .. }
            | Error::Encode { path, .. }
            | Error::Read { path, .. }
            | Error::Write { path, .. }
            | Error::Io { path, .. }
            | Error::Lock { path, .. } => Some(path),
            Error::Transformer(_) => None,
        }
    }

    pub(crate) fn read(path: &Path, error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            Error::not_found(path)
        } else {
            Error::Read {
                path: path.to_path_buf(),
                source: error,
            }
        }
    }

    pub(crate) fn write(path: &Path, error: io::Error) -> Self {
        Error::Write {
            path: path.to_path_buf(),
            source: error,
        }
    }

    pub(crate) fn io(operation: &'static str, path: &Path, error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            Error::not_found(path)
        } else {
            Error::Io {
                operation,
                path: path.to_path_buf(),
                source: error,
            }
        }
    }

    pub(crate) fn callback(error: impl Into<BoxError>) -> Self {
        Error::Transformer(error.into())
    }

    fn not_found(path: &Path) -> Self {
        Error::NotFound {
            path: path.to_path_buf(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
