//! The lock registry and its guards.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::LockKey;

/// Waiters for one held key, oldest first.
///
/// An entry exists in the registry exactly while its key is held, so the
/// presence of the entry is the holder flag.
#[derive(Default)]
struct Queue {
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl Queue {
    /// Hand the key to the oldest waiter still listening.
    ///
    /// Returns `false` when nobody took it, in which case the entry should be
    /// discarded.
    fn hand_off(&mut self) -> bool {
        while let Some(next) = self.waiters.pop_front() {
            if next.send(()).is_ok() {
                return true;
            }
        }
        false
    }

    fn live_waiters(&self) -> usize {
        self.waiters.iter().filter(|w| !w.is_closed()).count()
    }
}

#[derive(Default)]
struct Registry {
    table: Mutex<HashMap<LockKey, Queue>>,
}

impl Registry {
    fn table(&self) -> MutexGuard<'_, HashMap<LockKey, Queue>> {
        // The table is consistent between statements, so a panic elsewhere
        // while it was locked leaves nothing half-updated.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, key: &LockKey) {
        let mut table = self.table();
        let handed_off = match table.get_mut(key) {
            Some(queue) => queue.hand_off(),
            None => return,
        };
        if handed_off {
            trace!(key = %key, "lock handed to next waiter");
        } else {
            table.remove(key);
            trace!(key = %key, "lock released");
        }
    }
}

/// Exclusive, FIFO-ordered locks keyed by canonical pathname.
///
/// Cloning a `LockManager` yields another handle to the same registry.
/// Locks are process-local and not reentrant: a task that acquires a key it
/// already holds waits forever.
#[derive(Clone, Default)]
pub struct LockManager {
    registry: Arc<Registry>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free, then take it.
    ///
    /// Contending callers are served in the order they called `acquire`.
    /// Dropping the returned future before it resolves gives up the place in
    /// the queue; if the key had already been handed over, it is passed on.
    pub async fn acquire(&self, key: LockKey) -> LockGuard {
        loop {
            let receiver = {
                let mut table = self.registry.table();
                match table.entry(key.clone()) {
                    Entry::Vacant(vacant) => {
                        vacant.insert(Queue::default());
                        trace!(key = %key, "lock granted");
                        return self.guard(key);
                    }
                    Entry::Occupied(mut occupied) => {
                        let (sender, receiver) = oneshot::channel();
                        occupied.get_mut().waiters.push_back(sender);
                        trace!(key = %key, "waiting for lock");
                        receiver
                    }
                }
            };

            let mut waiter = Waiter {
                registry: Arc::clone(&self.registry),
                key: key.clone(),
                receiver,
                settled: false,
            };
            let granted = (&mut waiter.receiver).await.is_ok();
            waiter.settled = true;

            if granted {
                trace!(key = %key, "lock granted after wait");
                return self.guard(key);
            }
            // Senders are only dropped after a failed send, which cannot
            // happen while this waiter is listening. Queue up again anyway.
        }
    }

    /// Take `key` if nobody holds it.
    pub fn try_acquire(&self, key: LockKey) -> Option<LockGuard> {
        let granted = match self.registry.table().entry(key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Queue::default());
                true
            }
            Entry::Occupied(_) => false,
        };
        if !granted {
            return None;
        }
        trace!(key = %key, "lock granted");
        Some(self.guard(key))
    }

    /// Take two keys without risking deadlock against another pair holder.
    ///
    /// Keys are acquired in their total order, and only once when both name
    /// the same file.
    pub async fn acquire_pair(&self, a: LockKey, b: LockKey) -> PairGuard {
        if a == b {
            return PairGuard {
                first: self.acquire(a).await,
                second: None,
            };
        }

        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let first = self.acquire(low).await;
        let second = self.acquire(high).await;
        PairGuard {
            first,
            second: Some(second),
        }
    }

    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.registry.table().contains_key(key)
    }

    /// Number of callers queued behind the current holder of `key`.
    pub fn waiters(&self, key: &LockKey) -> usize {
        self.registry
            .table()
            .get(key)
            .map_or(0, Queue::live_waiters)
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.registry.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self, key: LockKey) -> LockGuard {
        LockGuard {
            registry: Arc::clone(&self.registry),
            key,
        }
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("held", &self.len())
            .finish()
    }
}

/// A place in a key's queue, owned by a pending `acquire`.
struct Waiter {
    registry: Arc<Registry>,
    key: LockKey,
    receiver: oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // After `close`, any hand-off either already landed in the channel or
        // will fail and move on to the next waiter.
        self.receiver.close();
        if self.receiver.try_recv().is_ok() {
            warn!(key = %self.key, "lock granted to a cancelled waiter; passing it on");
            self.registry.release(&self.key);
        }
    }
}

/// Exclusive ownership of one key. Dropping the guard releases the key.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    registry: Arc<Registry>,
    key: LockKey,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Release the key now. Same as dropping the guard.
    pub fn release(self) {}
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

/// Ownership of one or two keys taken by [`LockManager::acquire_pair`].
#[must_use = "the locks are released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PairGuard {
    first: LockGuard,
    second: Option<LockGuard>,
}

impl PairGuard {
    pub fn keys(&self) -> impl Iterator<Item = &LockKey> {
        std::iter::once(self.first.key()).chain(self.second.as_ref().map(LockGuard::key))
    }
}
