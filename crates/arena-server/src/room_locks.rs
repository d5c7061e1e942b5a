//! Per-room serialization.
//!
//! Every mutating coordinator operation runs inside [`RoomLocks::serialize`]
//! for its room. Operations on different rooms never wait on each other: the
//! table lock is held only long enough to fetch the room's slot.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use arena_core::RoomNo;

/// Lock table keyed by room number.
#[derive(Debug, Default)]
pub struct RoomLocks {
    slots: Mutex<HashMap<RoomNo, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the room's lock.
    ///
    /// The lock is released when `f` returns, whatever it returns. The slots
    /// guard no data of their own, so a poisoned slot is still usable.
    pub fn serialize<T>(&self, room_no: RoomNo, f: impl FnOnce() -> T) -> T {
        let slot = self.slot(room_no);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of rooms that have been serialized at least once.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn slot(&self, room_no: RoomNo) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(room_no).or_default())
    }
}
