//! Single filesystem round trips.
//!
//! Nothing here takes a lock. Callers hold the document's lock around every
//! call.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Marks temporary files left by atomic writes: `.{name}.pathdoc-tmp-{uuid}`.
const TEMP_MARKER: &str = ".pathdoc-tmp-";

pub(crate) async fn read(path: &Path) -> Result<Bytes> {
    fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|e| Error::read(path, e))
}

pub(crate) fn decode<T: DeserializeOwned>(path: &Path, contents: &[u8]) -> Result<T> {
    serde_json::from_slice(contents).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn encode<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<Vec<u8>> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(|source| Error::Encode {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace the whole content of `path`. The parent directory must exist.
pub(crate) async fn write(path: &Path, contents: &[u8], config: &StoreConfig) -> Result<()> {
    let written = if config.atomic_writes {
        replace(path, contents, config.sync_writes).await
    } else {
        overwrite(path, contents, config.sync_writes).await
    };
    written.map_err(|e| Error::write(path, e))
}

pub(crate) fn is_temporary(name: &str) -> bool {
    name.starts_with('.') && name.contains(TEMP_MARKER)
}

async fn overwrite(path: &Path, contents: &[u8], sync: bool) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    // tokio hands writes to a background thread; flushing waits for them so
    // the bytes are in place before the lock is released.
    file.flush().await?;
    if sync {
        file.sync_all().await?;
    }
    Ok(())
}

async fn replace(path: &Path, contents: &[u8], sync: bool) -> io::Result<()> {
    let temporary = temporary_sibling(path)?;

    let mut result = overwrite(&temporary, contents, sync).await;
    if result.is_ok() {
        result = fs::rename(&temporary, path).await;
    }
    if result.is_err() {
        discard(&temporary).await;
        return result;
    }
    if sync {
        sync_parent(path).await?;
    }
    Ok(())
}

/// Persist the directory entry a rename just changed.
#[cfg(unix)]
async fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::File::open(parent).await?.sync_all().await,
        None => fs::File::open(".").await?.sync_all().await,
    }
}

// Directories cannot be opened for syncing here; the rename is left to the
// filesystem.
#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn temporary_sibling(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "document path has no file name")
    })?;

    let mut temporary = OsString::from(".");
    temporary.push(name);
    temporary.push(TEMP_MARKER);
    temporary.push(uuid::Uuid::new_v4().to_string());
    Ok(path.with_file_name(temporary))
}

async fn discard(temporary: &Path) {
    match fs::remove_file(temporary).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temporary.display(), error = %e, "failed to remove temporary file"),
    }
}
