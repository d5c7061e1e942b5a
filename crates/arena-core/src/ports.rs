//! Collaborator ports.
//!
//! The coordinator reaches storage and fan-out only through these traits.
//! All methods take `&self`: implementations use interior mutability and must
//! be safe to share across request tasks.
//!
//! # Constraint contract
//!
//! Stores enforce uniqueness at write time rather than trusting an earlier
//! read. A write that would break an invariant fails with the matching
//! constraint error (`DuplicateMembership`, `CapacityExceeded`,
//! `DuplicateRoomName`, ...) and leaves the store unchanged.

use thiserror::Error;

use crate::{
    domain::{
        Capacity, InviteCode, Member, NewMember, NewRoom, Problem, ProblemNo, Room, RoomMember,
        RoomNo, UserNo,
    },
    error::ArenaError,
    event::{Channel, RoomEvent},
};

/// Errors reported by storage collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Unique (room, member) constraint violated.
    #[error("member {user_no} already has a row in room {room_no}")]
    DuplicateMembership {
        /// Room of the rejected row.
        room_no: RoomNo,
        /// Member of the rejected row.
        user_no: UserNo,
    },

    /// Insert would exceed the room's capacity.
    #[error("room {room_no} is at capacity ({capacity})")]
    CapacityExceeded {
        /// Room of the rejected row.
        room_no: RoomNo,
        /// The capacity the insert was checked against.
        capacity: usize,
    },

    /// No row for (room, member).
    #[error("no row for member {user_no} in room {room_no}")]
    MembershipNotFound {
        /// Room addressed.
        room_no: RoomNo,
        /// Member addressed.
        user_no: UserNo,
    },

    /// Unique room name constraint violated.
    #[error("room name already stored: {0}")]
    DuplicateRoomName(String),

    /// Unique invite code constraint violated.
    #[error("invite code already stored: {0}")]
    DuplicateInviteCode(String),

    /// Unique username constraint violated.
    #[error("username already stored: {0}")]
    DuplicateUsername(String),

    /// Unique nickname constraint violated.
    #[error("nickname already stored: {0}")]
    DuplicateNickname(String),

    /// No member with this number.
    #[error("no member {0}")]
    MemberNotFound(UserNo),

    /// Optimistic-concurrency collision. Safe to retry.
    #[error("transient conflict: {0}")]
    Transient(String),

    /// The store cannot serve requests.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Returns true if repeating the same write may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Member identities. Owned by the directory; the coordinator only reads.
pub trait MemberDirectory: Send + Sync {
    /// Look up a member by login key.
    fn find_by_username(&self, username: &str) -> Result<Option<Member>, StorageError>;

    /// Look up a member by number.
    fn find_by_user_no(&self, user_no: UserNo) -> Result<Option<Member>, StorageError>;

    /// Whether a nickname is taken.
    fn exists_by_nickname(&self, nickname: &str) -> Result<bool, StorageError>;

    /// Whether a username is taken.
    fn exists_by_username(&self, username: &str) -> Result<bool, StorageError>;

    /// Store a new member with zero exp, assigning its number.
    ///
    /// Fails with `DuplicateUsername` or `DuplicateNickname`.
    fn save_member(&self, member: NewMember) -> Result<Member, StorageError>;

    /// Change a member's nickname.
    ///
    /// Fails with `MemberNotFound` or `DuplicateNickname`.
    fn update_nickname(&self, user_no: UserNo, nickname: &str) -> Result<Member, StorageError>;

    /// All members in storage order.
    fn list_members(&self) -> Result<Vec<Member>, StorageError>;
}

/// Room definitions.
pub trait RoomCatalog: Send + Sync {
    /// Look up a room by number.
    fn find_room(&self, room_no: RoomNo) -> Result<Option<Room>, StorageError>;

    /// Look up a room by invite code.
    fn find_by_invite_code(&self, code: &InviteCode) -> Result<Option<Room>, StorageError>;

    /// Whether a room name is taken.
    fn exists_by_name(&self, room_name: &str) -> Result<bool, StorageError>;

    /// Store a validated room, assigning its number.
    ///
    /// Fails with `DuplicateRoomName` or `DuplicateInviteCode`.
    fn save_room(&self, room: NewRoom) -> Result<Room, StorageError>;

    /// All rooms in storage order (ascending room number).
    fn list_rooms(&self) -> Result<Vec<Room>, StorageError>;
}

/// Join rows, grouped per room.
pub trait MembershipStore: Send + Sync {
    /// Number of rows in a room.
    fn count_for(&self, room_no: RoomNo) -> Result<usize, StorageError>;

    /// Whether the member has a row in the room.
    fn exists_for(&self, room_no: RoomNo, user_no: UserNo) -> Result<bool, StorageError>;

    /// Insert a row, re-checking both constraints inside the write.
    ///
    /// Assigns `joined_seq` and returns the stored row. Fails with
    /// `DuplicateMembership` or `CapacityExceeded` without writing.
    fn insert(&self, row: RoomMember, capacity: Capacity) -> Result<RoomMember, StorageError>;

    /// A room's rows in join order.
    fn list_for(&self, room_no: RoomNo) -> Result<Vec<RoomMember>, StorageError>;

    /// Delete a row and return it. Fails with `MembershipNotFound`.
    fn remove(&self, room_no: RoomNo, user_no: UserNo) -> Result<RoomMember, StorageError>;

    /// Mutate a row in place and return the result.
    ///
    /// `apply` must not change the row's room or member. Fails with
    /// `MembershipNotFound`.
    fn update(
        &self,
        room_no: RoomNo,
        user_no: UserNo,
        apply: &mut dyn FnMut(&mut RoomMember),
    ) -> Result<RoomMember, StorageError>;
}

/// Problem lookups. Content management lives elsewhere.
pub trait ProblemCatalog: Send + Sync {
    /// Look up a problem by number.
    fn find_by_problem_no(&self, problem_no: ProblemNo) -> Result<Option<Problem>, StorageError>;
}

/// Fan-out of membership events to a room channel's subscribers.
///
/// Fire-and-forget: implementations must not block and must not report
/// delivery failures back to the coordinator.
pub trait NotificationPublisher: Send + Sync {
    /// Publish an event on a channel.
    fn publish(&self, channel: &Channel, event: RoomEvent);
}

/// The single identity capability: resolve an authenticated principal to the
/// member it names.
pub trait PrincipalResolver: Send + Sync {
    /// Resolve a principal (login key) to a member.
    ///
    /// Fails with `MemberNotFound` if nobody holds that login key.
    fn resolve(&self, principal: &str) -> Result<Member, ArenaError>;
}

/// Everything the coordinator needs from storage.
pub trait Store: MemberDirectory + RoomCatalog + MembershipStore + ProblemCatalog {}

impl<T> Store for T where T: MemberDirectory + RoomCatalog + MembershipStore + ProblemCatalog {}
