//! pathdoc: documents as files, collections as directories.
//!
//! Every read and write of a document is serialized through a process-local
//! lock on its canonical pathname, which gives callers atomic
//! read-modify-write ([`DocumentStore::update`]) and iteration that tolerates
//! concurrent deletion, on top of a filesystem that offers neither.

pub use pathdoc_lock::{LockGuard, LockKey, LockManager, PairGuard};
pub use pathdoc_store::{BoxError, Bytes, DocumentStore, Error, Result, StoreConfig, Update};
