//! Documents on a plain filesystem, with safe concurrent access.
//!
//! A document is one file, addressed by its pathname, holding either raw
//! bytes or JSON. A collection is one directory of documents. The
//! filesystem gives no atomicity across a read followed by a write, so
//! every operation here runs under the document's lock from
//! [`pathdoc_lock`]:
//!
//! - [`DocumentStore::get`] / [`DocumentStore::set`] and their raw
//!   `_buffer` forms do one read or one write.
//! - [`DocumentStore::update`] reads, hands the value to caller logic, and
//!   writes the result back, all under one lock. Concurrent updates of a
//!   document behave like a serial log; none is lost.
//! - [`DocumentStore::iterate_identifiers`] and
//!   [`DocumentStore::iterate_documents`] walk a collection one document at
//!   a time, locking each while it is visited.
//!
//! Locks are process-local. Other processes writing the same files are not
//! excluded.
//!
//! # Example
//!
//! ```rust,ignore
//! use pathdoc_store::{DocumentStore, Update};
//!
//! let store = DocumentStore::default();
//! store.ensure_collection("db/counters").await?;
//! store.set("db/counters/hits", &0).await?;
//!
//! store
//!     .update("db/counters/hits", 0, |n: u64| async move {
//!         Ok::<_, std::convert::Infallible>(Update::write(n + 1))
//!     })
//!     .await?;
//!
//! assert_eq!(store.get::<u64>("db/counters/hits").await?, 1);
//! ```

mod config;
mod error;
mod file;
mod iterate;
mod store;
mod update;

pub use config::StoreConfig;
pub use error::{BoxError, Error, Result};
pub use store::DocumentStore;
pub use update::Update;

pub use bytes::Bytes;
pub use pathdoc_lock::{LockGuard, LockKey, LockManager, PairGuard};
