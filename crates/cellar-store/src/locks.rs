//! Per-cell write locks.
//!
//! A [`PairLocks`] table hands out one async mutex per [`CellAddress`]. The
//! guard scopes the "read current max, insert max + 1" sequence of a put so
//! that two writers to the same cell cannot interleave, while writers to
//! different cells never touch the same mutex.
//!
//! Slots are created on demand and removed when the last holder or waiter
//! lets go, so the table only ever contains cells with writes in flight.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use cellar_types::CellAddress;

type Slot = Arc<Mutex<()>>;

/// Table of per-cell write locks.
#[derive(Default)]
pub struct PairLocks {
    slots: Arc<DashMap<CellAddress, Slot>>,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `address`.
    ///
    /// Dropping the returned future before it resolves leaves no
    /// reservation behind.
    pub async fn acquire(&self, address: &CellAddress) -> PairGuard {
        let mutex = Arc::clone(
            &*self
                .slots
                .entry(address.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        // Counts this waiter until it either holds the lock or is dropped.
        let slot = SlotRef {
            slot: Some(Arc::clone(&mutex)),
            slots: Arc::clone(&self.slots),
            address: address.clone(),
        };
        let guard = mutex.lock_owned().await;
        PairGuard {
            held: Some(Held {
                guard: Some(guard),
                slot,
            }),
        }
    }

    /// Number of cells with a lock slot currently allocated.
    pub fn active(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for PairLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairLocks")
            .field("active", &self.active())
            .finish()
    }
}

/// Exclusive write scope for one cell. Released on drop.
#[must_use = "the cell is unlocked as soon as the guard is dropped"]
pub struct PairGuard {
    held: Option<Held>,
}

impl PairGuard {
    /// A guard that holds nothing. Backends without a lock table return
    /// this and rely on the sequencing check in `insert` instead.
    pub fn unlocked() -> Self {
        Self { held: None }
    }

    pub fn is_locked(&self) -> bool {
        self.held.is_some()
    }
}

impl std::fmt::Debug for PairGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.held {
            Some(held) => write!(f, "PairGuard({})", held.slot.address),
            None => f.write_str("PairGuard(unlocked)"),
        }
    }
}

/// A counted reference to a slot, taken by holders and waiters alike.
/// The last one to go removes the slot from the table.
struct SlotRef {
    slot: Option<Slot>,
    slots: Arc<DashMap<CellAddress, Slot>>,
    address: CellAddress,
}

impl Drop for SlotRef {
    fn drop(&mut self) {
        // Only the table's own reference may remain.
        self.slot.take();
        self.slots
            .remove_if(&self.address, |_, slot| Arc::strong_count(slot) == 1);
    }
}

struct Held {
    guard: Option<OwnedMutexGuard<()>>,
    slot: SlotRef,
}

impl Drop for Held {
    fn drop(&mut self) {
        // The guard owns a reference too; release it before `slot` drops.
        self.guard.take();
    }
}
