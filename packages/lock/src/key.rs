//! Canonical lock keys.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

/// A canonical pathname identifying one serialization unit.
///
/// Keys are absolute and lexically normalized, so two spellings of the same
/// file (`db/./users/ann`, `db/tmp/../users/ann`, or a relative path and its
/// absolute form) map to the same key. Symlinks are not followed: the file
/// behind a key usually does not exist yet when the key is first taken.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LockKey(PathBuf);

impl LockKey {
    /// Build the key for `path`, resolving relative paths against the
    /// current working directory.
    ///
    /// Fails for an empty path or when the working directory cannot be read.
    pub fn canonical(path: impl AsRef<Path>) -> io::Result<LockKey> {
        let absolute = std::path::absolute(path.as_ref())?;
        Ok(LockKey(normalize(&absolute)))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for LockKey {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            // Popping the root is a no-op, so `/..` stays `/`.
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}
