//! Storage wrapper that injects faults.
//!
//! `ChaoticStore` delegates to a [`MemoryStore`] but can fail writes before
//! they reach it:
//!
//! - Membership inserts fail with `StorageError::Transient` at a seeded rate,
//!   the way an optimistic store reports a lost race.
//! - Individual membership updates can be scheduled to fail with
//!   `StorageError::Unavailable`, to exercise rollback of multi-step
//!   mutations.
//! - Member lookups can be taken down with `StorageError::Unavailable`.
//!
//! Faults are injected before delegation, so a failed write never changes
//! the underlying store.

use std::{
    collections::BTreeSet,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use arena_core::{
    Capacity, InviteCode, Member, MemberDirectory, MembershipStore, NewMember, NewRoom, Problem,
    ProblemCatalog, ProblemNo, Room, RoomCatalog, RoomMember, RoomNo, StorageError, UserNo,
};
use arena_server::MemoryStore;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fault-injecting store.
#[derive(Debug)]
pub struct ChaoticStore {
    inner: MemoryStore,
    insert_fail_rate: f64,
    rng: Mutex<ChaCha8Rng>,
    scheduled_update_faults: Mutex<BTreeSet<u64>>,
    update_calls: AtomicU64,
    lookups_down: AtomicBool,
    injected: AtomicU64,
}

impl ChaoticStore {
    /// Wrap an empty store. Inserts fail with probability `insert_fail_rate`.
    pub fn new(seed: u64, insert_fail_rate: f64) -> Self {
        Self {
            inner: MemoryStore::new(),
            insert_fail_rate: insert_fail_rate.clamp(0.0, 1.0),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            scheduled_update_faults: Mutex::new(BTreeSet::new()),
            update_calls: AtomicU64::new(0),
            lookups_down: AtomicBool::new(false),
            injected: AtomicU64::new(0),
        }
    }

    /// The wrapped store, for seeding and inspection without faults.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Fail the `nth` membership update from now (1-based).
    pub fn fail_update_in(&self, nth: u64) {
        let target = self.update_calls.load(Ordering::SeqCst) + nth;
        self.scheduled_update_faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target);
    }

    /// Fail every member lookup by number until switched back.
    pub fn set_member_lookups_down(&self, down: bool) {
        self.lookups_down.store(down, Ordering::SeqCst);
    }

    /// Faults injected so far.
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    fn roll_insert_fault(&self) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_bool(self.insert_fail_rate)
    }

    fn take_update_fault(&self) -> bool {
        let call = self.update_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.scheduled_update_faults.lock().unwrap_or_else(PoisonError::into_inner).remove(&call)
    }
}

impl MemberDirectory for ChaoticStore {
    fn find_by_username(&self, username: &str) -> Result<Option<Member>, StorageError> {
        self.inner.find_by_username(username)
    }

    fn find_by_user_no(&self, user_no: UserNo) -> Result<Option<Member>, StorageError> {
        if self.lookups_down.load(Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable(format!("injected lookup failure for {user_no}")));
        }
        self.inner.find_by_user_no(user_no)
    }

    fn exists_by_nickname(&self, nickname: &str) -> Result<bool, StorageError> {
        self.inner.exists_by_nickname(nickname)
    }

    fn exists_by_username(&self, username: &str) -> Result<bool, StorageError> {
        self.inner.exists_by_username(username)
    }

    fn save_member(&self, member: NewMember) -> Result<Member, StorageError> {
        self.inner.save_member(member)
    }

    fn update_nickname(&self, user_no: UserNo, nickname: &str) -> Result<Member, StorageError> {
        self.inner.update_nickname(user_no, nickname)
    }

    fn list_members(&self) -> Result<Vec<Member>, StorageError> {
        self.inner.list_members()
    }
}

impl RoomCatalog for ChaoticStore {
    fn find_room(&self, room_no: RoomNo) -> Result<Option<Room>, StorageError> {
        self.inner.find_room(room_no)
    }

    fn find_by_invite_code(&self, code: &InviteCode) -> Result<Option<Room>, StorageError> {
        self.inner.find_by_invite_code(code)
    }

    fn exists_by_name(&self, room_name: &str) -> Result<bool, StorageError> {
        self.inner.exists_by_name(room_name)
    }

    fn save_room(&self, room: NewRoom) -> Result<Room, StorageError> {
        self.inner.save_room(room)
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StorageError> {
        self.inner.list_rooms()
    }
}

impl MembershipStore for ChaoticStore {
    fn count_for(&self, room_no: RoomNo) -> Result<usize, StorageError> {
        self.inner.count_for(room_no)
    }

    fn exists_for(&self, room_no: RoomNo, user_no: UserNo) -> Result<bool, StorageError> {
        self.inner.exists_for(room_no, user_no)
    }

    fn insert(&self, row: RoomMember, capacity: Capacity) -> Result<RoomMember, StorageError> {
        if self.roll_insert_fault() {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Transient(format!(
                "injected conflict on room {} member {}",
                row.room_no, row.user_no
            )));
        }
        self.inner.insert(row, capacity)
    }

    fn list_for(&self, room_no: RoomNo) -> Result<Vec<RoomMember>, StorageError> {
        self.inner.list_for(room_no)
    }

    fn remove(&self, room_no: RoomNo, user_no: UserNo) -> Result<RoomMember, StorageError> {
        self.inner.remove(room_no, user_no)
    }

    fn update(
        &self,
        room_no: RoomNo,
        user_no: UserNo,
        apply: &mut dyn FnMut(&mut RoomMember),
    ) -> Result<RoomMember, StorageError> {
        if self.take_update_fault() {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable(format!(
                "injected update failure on room {room_no} member {user_no}"
            )));
        }
        self.inner.update(room_no, user_no, apply)
    }
}

impl ProblemCatalog for ChaoticStore {
    fn find_by_problem_no(&self, problem_no: ProblemNo) -> Result<Option<Problem>, StorageError> {
        self.inner.find_by_problem_no(problem_no)
    }
}
