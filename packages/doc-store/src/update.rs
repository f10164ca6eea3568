//! Atomic read-transform-write of a single document.

use std::future::Future;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{BoxError, Error, Result};
use crate::file;
use crate::store::DocumentStore;

/// What an update transformer decided.
///
/// `R` is an auxiliary result handed back to the caller of
/// [`DocumentStore::update`] whether or not anything was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<T, R = ()> {
    /// Replace the document with this value.
    Write(T, R),
    /// Leave the document exactly as it is.
    Unchanged(R),
}

impl<T> Update<T> {
    pub fn write(value: T) -> Self {
        Update::Write(value, ())
    }

    pub fn unchanged() -> Self {
        Update::Unchanged(())
    }
}

impl<T, R> Update<T, R> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Update::Write(value, _) => Some(value),
            Update::Unchanged(_) => None,
        }
    }

    pub fn result(&self) -> &R {
        match self {
            Update::Write(_, result) | Update::Unchanged(result) => result,
        }
    }
}

impl DocumentStore {
    /// Read, transform and conditionally rewrite a document under one lock.
    ///
    /// The current value is the decoded document, or `default` when the
    /// document does not exist (`default` itself is never written). The lock
    /// is held while `transformer` runs, however long that takes, so
    /// concurrent updates of one document see each other's writes and none
    /// is lost.
    ///
    /// - `Err(e)` from the transformer writes nothing and returns
    ///   [`Error::Transformer`].
    /// - [`Update::Unchanged`] writes nothing and returns its result.
    /// - [`Update::Write`] replaces the document and returns its result once
    ///   the write is done.
    ///
    /// Read failures other than absence (including undecodable content) are
    /// returned without calling the transformer. The lock is released on
    /// every path, including a panicking transformer or a dropped future.
    pub async fn update<T, R, F, Fut, E>(
        &self,
        path: impl AsRef<Path>,
        default: T,
        transformer: F,
    ) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = std::result::Result<Update<T, R>, E>>,
        E: Into<BoxError>,
    {
        let path = path.as_ref();
        let _guard = self.lock(path).await?;

        let current = match file::read(path).await {
            Ok(contents) => file::decode(path, &contents)?,
            Err(Error::NotFound { .. }) => default,
            Err(e) => return Err(e),
        };

        match transformer(current).await.map_err(Error::callback)? {
            Update::Unchanged(result) => {
                debug!(path = %path.display(), "update left document unchanged");
                Ok(result)
            }
            Update::Write(value, result) => {
                let contents = file::encode(path, &value, self.config().pretty_json)?;
                file::write(path, &contents, self.config()).await?;
                debug!(path = %path.display(), "update wrote document");
                Ok(result)
            }
        }
    }
}
