//! Sequential traversal of a collection.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{BoxError, Error, Result};
use crate::file;
use crate::store::DocumentStore;

impl DocumentStore {
    /// Visit every entry of the collection `dir`, one at a time.
    ///
    /// `per_item` receives the entry's path and identifier (its file name)
    /// and runs while the entry's lock is held; the lock is released before
    /// the next entry is visited. Entries come in directory listing order,
    /// which is unspecified.
    ///
    /// The first error, from listing `dir` or from `per_item`, stops the
    /// traversal and is returned. `per_item` must not run locking operations
    /// on the entry it was handed ([`DocumentStore::exists`] is fine).
    pub async fn iterate_identifiers<F, Fut, E>(
        &self,
        dir: impl AsRef<Path>,
        mut per_item: F,
    ) -> Result<()>
    where
        F: FnMut(PathBuf, String) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: Into<BoxError>,
    {
        let dir = dir.as_ref();
        for id in list_identifiers(dir).await? {
            let path = dir.join(&id);
            let _guard = self.lock(&path).await?;
            per_item(path, id).await.map_err(Error::callback)?;
        }
        Ok(())
    }

    /// Visit the decoded content of every document in the collection `dir`.
    ///
    /// Behaves like [`DocumentStore::iterate_identifiers`], except that each
    /// document is read and decoded under its lock before `per_item` sees
    /// it. A document destroyed after the listing was taken is skipped; any
    /// other read or decode failure stops the traversal.
    pub async fn iterate_documents<T, F, Fut, E>(
        &self,
        dir: impl AsRef<Path>,
        mut per_item: F,
    ) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(T, String) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: Into<BoxError>,
    {
        let dir = dir.as_ref();
        for id in list_identifiers(dir).await? {
            let path = dir.join(&id);
            let _guard = self.lock(&path).await?;

            let contents = match file::read(&path).await {
                Ok(contents) => contents,
                Err(Error::NotFound { .. }) => {
                    debug!(path = %path.display(), "document vanished during iteration");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let value = file::decode(&path, &contents)?;
            per_item(value, id).await.map_err(Error::callback)?;
        }
        Ok(())
    }
}

/// Snapshot of the identifiers in `dir`, minus in-flight temporary files.
async fn list_identifiers(dir: &Path) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::io("readdir", dir, e))?;

    let mut ids = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io("readdir", dir, e))?
    {
        match entry.file_name().into_string() {
            Ok(id) if file::is_temporary(&id) => {}
            Ok(id) => ids.push(id),
            Err(name) => warn!(dir = %dir.display(), ?name, "skipping entry with a non-UTF-8 name"),
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use pathdoc_lock::LockKey;

    #[tokio::test]
    async fn listing_skips_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc"), "1").unwrap();
        std::fs::write(dir.path().join(".doc.pathdoc-tmp-1234"), "2").unwrap();

        assert_eq!(list_identifiers(dir.path()).await.unwrap(), vec!["doc"]);
    }

    #[tokio::test]
    async fn entry_is_locked_while_visited() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        store.set(dir.path().join("a"), &1).await.unwrap();

        let locks = store.lock_manager().clone();
        let mut visited = 0;
        store
            .iterate_identifiers(dir.path(), |path, id| {
                visited += 1;
                assert_eq!(id, "a");
                assert!(locks.is_locked(&LockKey::canonical(&path).unwrap()));
                async { Ok::<_, Infallible>(()) }
            })
            .await
            .unwrap();

        assert_eq!(visited, 1);
        assert!(store.lock_manager().is_empty());
    }

    #[tokio::test]
    async fn missing_collection_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();

        let e = store
            .iterate_identifiers(dir.path().join("nothing"), |_, _| async {
                Ok::<_, Infallible>(())
            })
            .await
            .unwrap_err();
        assert!(e.is_not_found());
    }
}
