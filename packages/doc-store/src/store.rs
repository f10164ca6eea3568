//! The document store and its single-document primitives.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use bytes::Bytes;
use pathdoc_lock::{LockGuard, LockKey, LockManager};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::file;

/// Documents stored one per file, collections one per directory.
///
/// Every read or write of a document runs while holding the lock for its
/// canonical pathname, so operations on one document take effect one at a
/// time, in the order they were issued. Operations on different documents
/// do not wait for each other.
///
/// Cloning a store is cheap and the clone shares its locks. Stores built
/// separately only exclude each other if they were given the same
/// [`LockManager`] through [`DocumentStore::with_lock_manager`].
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    config: StoreConfig,
    locks: LockManager,
}

impl DocumentStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_lock_manager(config, LockManager::new())
    }

    pub fn with_lock_manager(config: StoreConfig, locks: LockManager) -> Self {
        Self { config, locks }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The lock table guarding this store's documents.
    ///
    /// Callers that need several documents to stay consistent can take
    /// their locks directly, in a fixed order. Store operations on a path
    /// whose lock the caller holds never complete.
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Read the raw content of a document.
    pub async fn get_buffer(&self, path: impl AsRef<Path>) -> Result<Bytes> {
        let path = path.as_ref();
        let _guard = self.lock(path).await?;
        debug!(path = %path.display(), "get");
        file::read(path).await
    }

    /// Read a document and decode it from JSON.
    pub async fn get<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let contents = self.get_buffer(path).await?;
        file::decode(path, &contents)
    }

    /// Replace the whole content of a document with raw bytes.
    ///
    /// The parent directory must already exist; it is not created.
    pub async fn set_buffer(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        let path = path.as_ref();
        let contents = contents.as_ref();
        let _guard = self.lock(path).await?;
        debug!(path = %path.display(), len = contents.len(), "set");
        file::write(path, contents, &self.config).await
    }

    /// Replace the whole content of a document with `value` encoded as JSON.
    pub async fn set<T: Serialize + ?Sized>(&self, path: impl AsRef<Path>, value: &T) -> Result<()> {
        let path = path.as_ref();
        let contents = file::encode(path, value, self.config.pretty_json)?;
        self.set_buffer(path, contents).await
    }

    /// Whether anything exists at `path`.
    ///
    /// No lock is taken, so the answer may be stale by the time it is used.
    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        fs::try_exists(path.as_ref()).await.unwrap_or(false)
    }

    /// Remove a document. Removing an absent document is `NotFound`.
    pub async fn destroy(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let _guard = self.lock(path).await?;
        debug!(path = %path.display(), "destroy");
        fs::remove_file(path)
            .await
            .map_err(|e| Error::io("unlink", path, e))
    }

    /// Move a document, replacing any document already at `to`.
    ///
    /// Both paths are locked for the duration, in a fixed order, so a rename
    /// never interleaves with another operation on either document.
    pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        let _guards = self
            .locks
            .acquire_pair(lock_key(from)?, lock_key(to)?)
            .await;
        debug!(from = %from.display(), to = %to.display(), "rename");
        let Err(e) = fs::rename(from, to).await else {
            return Ok(());
        };
        // A missing destination directory also reports NotFound; only an
        // absent source makes the document not found.
        if e.kind() == io::ErrorKind::NotFound && fs::symlink_metadata(from).await.is_ok() {
            return Err(Error::write(to, e));
        }
        Err(Error::io("rename", from, e))
    }

    /// Create an empty document, and any missing parent directories, unless
    /// one already exists. Existing content is left untouched.
    pub async fn touch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let _guard = self.lock(path).await?;
        debug!(path = %path.display(), "touch");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io("mkdir", parent, e))?;
        }
        // Appending creates without truncating.
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map(drop)
            .map_err(|e| Error::write(path, e))
    }

    /// Same as [`DocumentStore::touch`].
    pub async fn ensure(&self, path: impl AsRef<Path>) -> Result<()> {
        self.touch(path).await
    }

    /// Read a document together with the modification time the filesystem
    /// reports for it, as one snapshot.
    pub async fn get_with_modification_time<T: DeserializeOwned>(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(T, SystemTime)> {
        let path = path.as_ref();
        let (metadata, contents) = {
            let _guard = self.lock(path).await?;
            debug!(path = %path.display(), "get with modification time");
            tokio::try_join!(
                async { fs::metadata(path).await.map_err(|e| Error::io("stat", path, e)) },
                file::read(path),
            )?
        };
        let modified = metadata
            .modified()
            .map_err(|e| Error::io("stat", path, e))?;
        Ok((file::decode(path, &contents)?, modified))
    }

    /// Create a collection directory and any missing parents. Succeeds if it
    /// already exists.
    pub async fn ensure_collection(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), "ensure collection");
        fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::io("mkdir", dir, e))
    }

    /// Remove a collection and every document in it. Succeeds if it is
    /// already gone.
    ///
    /// Document locks are not taken; an operation racing the removal of its
    /// document sees it vanish.
    pub async fn destroy_collection(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), "destroy collection");
        match fs::remove_dir_all(dir).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::io("rmdir", dir, e)),
            _ => Ok(()),
        }
    }

    pub(crate) async fn lock(&self, path: &Path) -> Result<LockGuard> {
        Ok(self.locks.acquire(lock_key(path)?).await)
    }
}

fn lock_key(path: &Path) -> Result<LockKey> {
    LockKey::canonical(path).map_err(|source| Error::Lock {
        path: path.to_path_buf(),
        source,
    })
}
