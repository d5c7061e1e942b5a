//! Domain error taxonomy.
//!
//! Every rejection the coordinator or member service can produce. Each
//! variant has exactly one [`ErrorKind`] and each kind exactly one stable
//! external code, which the transport boundary maps to its own status codes.

use std::fmt;

use thiserror::Error;

use crate::{
    domain::{ProblemNo, RoomNo, UserNo},
    ports::StorageError,
};

/// How a missing room was looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomLookup {
    /// Direct lookup by room number.
    Number(RoomNo),
    /// Lookup through an invite code.
    InviteCode(String),
}

impl fmt::Display for RoomLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(room_no) => write!(f, "#{room_no}"),
            Self::InviteCode(code) => write!(f, "invite code {code:?}"),
        }
    }
}

/// Errors from coordinator and member operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// No room matches the lookup.
    #[error("room not found: {0}")]
    RoomNotFound(RoomLookup),

    /// Secret room, wrong or missing password.
    #[error("wrong password for room {room_no}")]
    PasswordMismatch {
        /// Room joined.
        room_no: RoomNo,
    },

    /// Public room, but a password was supplied.
    #[error("room {room_no} is public and takes no password")]
    PasswordNotAllowed {
        /// Room joined.
        room_no: RoomNo,
    },

    /// Membership is at capacity.
    #[error("room {room_no} is full ({capacity}/{capacity})")]
    RoomFull {
        /// Room joined.
        room_no: RoomNo,
        /// The room's member limit.
        capacity: usize,
    },

    /// The member already has a row in the room.
    #[error("member {user_no} already joined room {room_no}")]
    AlreadyJoined {
        /// Room joined.
        room_no: RoomNo,
        /// Joining member.
        user_no: UserNo,
    },

    /// The member has no row in the room.
    #[error("member {user_no} has not joined room {room_no}")]
    NotJoined {
        /// Room addressed.
        room_no: RoomNo,
        /// Addressed member.
        user_no: UserNo,
    },

    /// Room name taken.
    #[error("room name already taken: {0}")]
    DuplicateRoomName(String),

    /// Secret room password fails validation.
    #[error("invalid room password: {reason}")]
    InvalidPassword {
        /// Which rule failed.
        reason: &'static str,
    },

    /// Capacity not one of 2, 4, 6.
    #[error("invalid member limit {requested}: must be 2, 4 or 6")]
    InvalidCapacity {
        /// Requested capacity.
        requested: u8,
    },

    /// Referenced problem does not exist.
    #[error("problem not found: {0}")]
    ProblemNotFound(ProblemNo),

    /// Nickname taken.
    #[error("nickname already taken: {0}")]
    DuplicateNickname(String),

    /// Username taken.
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// No member matches the principal.
    #[error("member not found: {0}")]
    MemberNotFound(String),

    /// Storage failed in a way the caller cannot fix.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ArenaError::RoomNotFound`].
    RoomNotFound,
    /// See [`ArenaError::PasswordMismatch`].
    PasswordMismatch,
    /// See [`ArenaError::PasswordNotAllowed`].
    PasswordNotAllowed,
    /// See [`ArenaError::RoomFull`].
    RoomFull,
    /// See [`ArenaError::AlreadyJoined`].
    AlreadyJoined,
    /// See [`ArenaError::NotJoined`].
    NotJoined,
    /// See [`ArenaError::DuplicateRoomName`].
    DuplicateRoomName,
    /// See [`ArenaError::InvalidPassword`].
    InvalidPassword,
    /// See [`ArenaError::InvalidCapacity`].
    InvalidCapacity,
    /// See [`ArenaError::ProblemNotFound`].
    ProblemNotFound,
    /// See [`ArenaError::DuplicateNickname`].
    DuplicateNickname,
    /// See [`ArenaError::DuplicateUsername`].
    DuplicateUsername,
    /// See [`ArenaError::MemberNotFound`].
    MemberNotFound,
    /// See [`ArenaError::Storage`].
    Storage,
}

impl ErrorKind {
    /// Stable external code. Never renumber or rename these.
    pub fn code(self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::PasswordMismatch => "PASSWORD_MISMATCH",
            Self::PasswordNotAllowed => "PASSWORD_NOT_ALLOWED",
            Self::RoomFull => "ROOM_FULL",
            Self::AlreadyJoined => "ALREADY_JOINED",
            Self::NotJoined => "NOT_JOINED",
            Self::DuplicateRoomName => "DUPLICATE_ROOM_NAME",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidCapacity => "INVALID_CAPACITY",
            Self::ProblemNotFound => "PROBLEM_NOT_FOUND",
            Self::DuplicateNickname => "DUPLICATE_NICKNAME",
            Self::DuplicateUsername => "DUPLICATE_USERNAME",
            Self::MemberNotFound => "MEMBER_NOT_FOUND",
            Self::Storage => "STORAGE_UNAVAILABLE",
        }
    }
}

impl ArenaError {
    /// The machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomNotFound(_) => ErrorKind::RoomNotFound,
            Self::PasswordMismatch { .. } => ErrorKind::PasswordMismatch,
            Self::PasswordNotAllowed { .. } => ErrorKind::PasswordNotAllowed,
            Self::RoomFull { .. } => ErrorKind::RoomFull,
            Self::AlreadyJoined { .. } => ErrorKind::AlreadyJoined,
            Self::NotJoined { .. } => ErrorKind::NotJoined,
            Self::DuplicateRoomName(_) => ErrorKind::DuplicateRoomName,
            Self::InvalidPassword { .. } => ErrorKind::InvalidPassword,
            Self::InvalidCapacity { .. } => ErrorKind::InvalidCapacity,
            Self::ProblemNotFound(_) => ErrorKind::ProblemNotFound,
            Self::DuplicateNickname(_) => ErrorKind::DuplicateNickname,
            Self::DuplicateUsername(_) => ErrorKind::DuplicateUsername,
            Self::MemberNotFound(_) => ErrorKind::MemberNotFound,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if the caller's input caused this error.
    ///
    /// User errors are final for the given input and never retried.
    /// Storage errors are the only infrastructure failures.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
