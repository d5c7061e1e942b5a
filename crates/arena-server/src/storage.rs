//! In-memory storage.
//!
//! `MemoryStore` implements every collaborator port over `RwLock`-guarded
//! tables. Each trait method takes one table lock for its whole read or
//! write, so readers see either all of a write or none of it.
//!
//! Constraints are enforced inside the write lock, never from an earlier
//! read: a racing duplicate or over-capacity insert fails here even if the
//! caller's own checks passed.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use arena_core::{
    Capacity, InviteCode, Member, MemberDirectory, MembershipStore, NewMember, NewRoom, Problem,
    ProblemCatalog, ProblemNo, Room, RoomCatalog, RoomMember, RoomNo, StorageError, UserNo,
};

#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<u64, T>,
    next_no: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { rows: BTreeMap::new(), next_no: 1 }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> u64 {
        let no = self.next_no;
        self.next_no += 1;
        no
    }
}

/// In-memory store for members, rooms, join rows and problems.
#[derive(Debug, Default)]
pub struct MemoryStore {
    members: RwLock<Table<Member>>,
    rooms: RwLock<Table<Room>>,
    memberships: RwLock<HashMap<RoomNo, Vec<RoomMember>>>,
    problems: RwLock<Table<Problem>>,
    join_seq: AtomicU64,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StorageError> {
    lock.read().map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StorageError> {
    lock.write().map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a problem. Problem content is managed elsewhere; this only
    /// gives rooms something to link to.
    pub fn insert_problem(&self, title: impl Into<String>) -> Result<Problem, StorageError> {
        let mut problems = write(&self.problems)?;
        let problem = Problem { problem_no: problems.allocate(), title: title.into() };
        problems.rows.insert(problem.problem_no, problem.clone());
        Ok(problem)
    }

    /// Add exp to a member, as the scoring subsystem does after a round.
    ///
    /// Exp only grows; the addition saturates.
    pub fn award_exp(&self, user_no: UserNo, amount: u64) -> Result<Member, StorageError> {
        let mut members = write(&self.members)?;
        let member =
            members.rows.get_mut(&user_no).ok_or(StorageError::MemberNotFound(user_no))?;
        member.exp = member.exp.saturating_add(amount);
        Ok(member.clone())
    }
}

impl MemberDirectory for MemoryStore {
    fn find_by_username(&self, username: &str) -> Result<Option<Member>, StorageError> {
        Ok(read(&self.members)?.rows.values().find(|m| m.username == username).cloned())
    }

    fn find_by_user_no(&self, user_no: UserNo) -> Result<Option<Member>, StorageError> {
        Ok(read(&self.members)?.rows.get(&user_no).cloned())
    }

    fn exists_by_nickname(&self, nickname: &str) -> Result<bool, StorageError> {
        Ok(read(&self.members)?.rows.values().any(|m| m.nickname == nickname))
    }

    fn exists_by_username(&self, username: &str) -> Result<bool, StorageError> {
        Ok(read(&self.members)?.rows.values().any(|m| m.username == username))
    }

    fn save_member(&self, member: NewMember) -> Result<Member, StorageError> {
        let mut members = write(&self.members)?;
        if members.rows.values().any(|m| m.username == member.username) {
            return Err(StorageError::DuplicateUsername(member.username));
        }
        if members.rows.values().any(|m| m.nickname == member.nickname) {
            return Err(StorageError::DuplicateNickname(member.nickname));
        }

        let stored = Member {
            user_no: members.allocate(),
            username: member.username,
            nickname: member.nickname,
            exp: 0,
        };
        members.rows.insert(stored.user_no, stored.clone());
        Ok(stored)
    }

    fn update_nickname(&self, user_no: UserNo, nickname: &str) -> Result<Member, StorageError> {
        let mut members = write(&self.members)?;
        if members.rows.values().any(|m| m.nickname == nickname && m.user_no != user_no) {
            return Err(StorageError::DuplicateNickname(nickname.to_string()));
        }

        let member =
            members.rows.get_mut(&user_no).ok_or(StorageError::MemberNotFound(user_no))?;
        nickname.clone_into(&mut member.nickname);
        Ok(member.clone())
    }

    fn list_members(&self) -> Result<Vec<Member>, StorageError> {
        Ok(read(&self.members)?.rows.values().cloned().collect())
    }
}

impl RoomCatalog for MemoryStore {
    fn find_room(&self, room_no: RoomNo) -> Result<Option<Room>, StorageError> {
        Ok(read(&self.rooms)?.rows.get(&room_no).cloned())
    }

    fn find_by_invite_code(&self, code: &InviteCode) -> Result<Option<Room>, StorageError> {
        Ok(read(&self.rooms)?.rows.values().find(|r| &r.invite_code == code).cloned())
    }

    fn exists_by_name(&self, room_name: &str) -> Result<bool, StorageError> {
        Ok(read(&self.rooms)?.rows.values().any(|r| r.room_name == room_name))
    }

    fn save_room(&self, room: NewRoom) -> Result<Room, StorageError> {
        let mut rooms = write(&self.rooms)?;
        if rooms.rows.values().any(|r| r.room_name == room.room_name) {
            return Err(StorageError::DuplicateRoomName(room.room_name));
        }
        if rooms.rows.values().any(|r| r.invite_code == room.invite_code) {
            return Err(StorageError::DuplicateInviteCode(room.invite_code.to_string()));
        }

        let stored = Room {
            room_no: rooms.allocate(),
            room_name: room.room_name,
            access: room.access,
            invite_code: room.invite_code,
            capacity: room.capacity,
            problem_no: room.problem_no,
        };
        rooms.rows.insert(stored.room_no, stored.clone());
        Ok(stored)
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StorageError> {
        Ok(read(&self.rooms)?.rows.values().cloned().collect())
    }
}

impl MembershipStore for MemoryStore {
    fn count_for(&self, room_no: RoomNo) -> Result<usize, StorageError> {
        Ok(read(&self.memberships)?.get(&room_no).map_or(0, Vec::len))
    }

    fn exists_for(&self, room_no: RoomNo, user_no: UserNo) -> Result<bool, StorageError> {
        Ok(read(&self.memberships)?
            .get(&room_no)
            .is_some_and(|rows| rows.iter().any(|r| r.user_no == user_no)))
    }

    fn insert(&self, mut row: RoomMember, capacity: Capacity) -> Result<RoomMember, StorageError> {
        let mut memberships = write(&self.memberships)?;
        let rows = memberships.entry(row.room_no).or_default();

        if rows.len() >= capacity.limit() {
            return Err(StorageError::CapacityExceeded {
                room_no: row.room_no,
                capacity: capacity.limit(),
            });
        }
        if rows.iter().any(|r| r.user_no == row.user_no) {
            return Err(StorageError::DuplicateMembership {
                room_no: row.room_no,
                user_no: row.user_no,
            });
        }

        row.joined_seq = self.join_seq.fetch_add(1, Ordering::Relaxed) + 1;
        rows.push(row.clone());
        Ok(row)
    }

    fn list_for(&self, room_no: RoomNo) -> Result<Vec<RoomMember>, StorageError> {
        Ok(read(&self.memberships)?.get(&room_no).cloned().unwrap_or_default())
    }

    fn remove(&self, room_no: RoomNo, user_no: UserNo) -> Result<RoomMember, StorageError> {
        let mut memberships = write(&self.memberships)?;
        let rows = memberships
            .get_mut(&room_no)
            .ok_or(StorageError::MembershipNotFound { room_no, user_no })?;
        let index = rows
            .iter()
            .position(|r| r.user_no == user_no)
            .ok_or(StorageError::MembershipNotFound { room_no, user_no })?;
        Ok(rows.remove(index))
    }

    fn update(
        &self,
        room_no: RoomNo,
        user_no: UserNo,
        apply: &mut dyn FnMut(&mut RoomMember),
    ) -> Result<RoomMember, StorageError> {
        let mut memberships = write(&self.memberships)?;
        let row = memberships
            .get_mut(&room_no)
            .and_then(|rows| rows.iter_mut().find(|r| r.user_no == user_no))
            .ok_or(StorageError::MembershipNotFound { room_no, user_no })?;
        apply(row);
        Ok(row.clone())
    }
}

impl ProblemCatalog for MemoryStore {
    fn find_by_problem_no(&self, problem_no: ProblemNo) -> Result<Option<Problem>, StorageError> {
        Ok(read(&self.problems)?.rows.get(&problem_no).cloned())
    }
}
