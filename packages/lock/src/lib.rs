//! Path-keyed exclusive locks for pathdoc.
//!
//! Every document operation in pathdoc runs while holding the lock for the
//! document's canonical pathname. This crate provides that lock table:
//!
//! - [`LockKey`] turns a pathname into its canonical form, so two spellings
//!   of one file share a lock.
//! - [`LockManager::acquire`] waits for a key and returns a [`LockGuard`];
//!   contending callers are served first come, first served.
//! - Dropping the guard hands the key to the next waiter, or forgets the key
//!   when nobody is waiting, so the table only holds keys in use.
//!
//! Reads and writes are treated alike. There are no shared (reader) locks and
//! no reentrancy: acquiring a key the current task already holds never
//! completes.
//!
//! # Example
//!
//! ```rust,ignore
//! use pathdoc_lock::{LockKey, LockManager};
//!
//! let locks = LockManager::new();
//! let guard = locks.acquire(LockKey::canonical("db/users/ann")?).await;
//! // ... exclusive access to db/users/ann ...
//! drop(guard);
//! ```

mod key;
mod manager;

pub use key::LockKey;
pub use manager::{LockGuard, LockManager, PairGuard};
