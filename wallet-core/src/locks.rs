//! Row-level locking keyed by entity ID
//!
//! The storage layer has no transactions beyond atomic `WriteBatch`
//! commits, so read-modify-write sequences on user and job rows are
//! serialized through this table instead. Lock waits are bounded; an
//! exceeded wait surfaces as a retryable [`Error::Contention`], never a
//! hang.
//!
//! Lock acquisition order across operations is always user before job.
//!
//! Slots are evicted when the last handle to them goes away, so the table
//! tracks currently contended entities rather than every entity ever
//! locked. Eviction only fires when the map's own `Arc` is the sole
//! reference, which the shard lock makes race-free against concurrent
//! `acquire` calls.

use crate::error::{Error, Result};
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

type Slots = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Guard holding an entity's row lock
///
/// Dropping the guard releases the lock and evicts the slot if no other
/// thread holds a handle to it.
pub struct EntityGuard {
    id: Uuid,
    slots: Slots,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        // Release the mutex before deciding on eviction; a strong count of
        // one means only the map itself still references the slot
        self.guard.take();
        self.slots
            .remove_if(&self.id, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// Per-entity lock table
#[derive(Clone, Default)]
pub struct LockTable {
    inner: Slots,
}

impl LockTable {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `id`, waiting at most `wait`
    pub fn acquire(&self, id: Uuid, wait: Duration) -> Result<EntityGuard> {
        let slot = self.inner.entry(id).or_default().clone();
        match slot.try_lock_arc_for(wait) {
            Some(guard) => Ok(EntityGuard {
                id,
                slots: self.inner.clone(),
                guard: Some(guard),
            }),
            None => {
                drop(slot);
                self.evict_if_idle(id);
                Err(Error::Contention(id.to_string()))
            }
        }
    }

    /// Acquire the lock for `id` without blocking
    pub fn try_acquire(&self, id: Uuid) -> Result<EntityGuard> {
        let slot = self.inner.entry(id).or_default().clone();
        match slot.try_lock_arc() {
            Some(guard) => Ok(EntityGuard {
                id,
                slots: self.inner.clone(),
                guard: Some(guard),
            }),
            None => {
                drop(slot);
                self.evict_if_idle(id);
                Err(Error::Contention(id.to_string()))
            }
        }
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check whether no slots are live
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop the slot for `id` if nothing references it
    ///
    /// A holder keeps an extra `Arc` inside its guard, so a count of one
    /// guarantees the slot is unlocked and unreferenced.
    fn evict_if_idle(&self, id: Uuid) {
        self.inner
            .remove_if(&id, |_, slot| Arc::strong_count(slot) == 1);
    }
}
