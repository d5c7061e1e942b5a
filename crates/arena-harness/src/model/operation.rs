//! Operations for model-based testing.
//!
//! Operations represent every membership action a client can take. They are
//! generated randomly by proptest and applied to both the model and the real
//! coordinator.

use arbitrary::Arbitrary;
use arena_core::ArenaError;

/// Client identifier (0-indexed).
pub type ClientId = u8;

/// Room identifier (uses u8 to keep test space manageable).
pub type ModelRoomId = u8;

/// Password every secret model room is created with.
pub const ROOM_PASSWORD: &str = "1234";

/// A password that never matches.
pub const WRONG_PASSWORD: &str = "9999";

/// What a client types into the password box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum PasswordChoice {
    /// Leaves it empty.
    Omit,
    /// Types the room password.
    Right,
    /// Types something else.
    Wrong,
}

impl PasswordChoice {
    /// The password as submitted.
    pub fn as_submitted(self) -> Option<&'static str> {
        match self {
            Self::Omit => None,
            Self::Right => Some(ROOM_PASSWORD),
            Self::Wrong => Some(WRONG_PASSWORD),
        }
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Create a room named after its model id.
    CreateRoom {
        /// Room to create.
        room_id: ModelRoomId,
        /// Whether the room takes a password.
        secret: bool,
        /// Capacity selector: 0, 1, 2 map to 2, 4, 6 seats.
        size_class: u8,
    },

    /// Client joins a room by number.
    JoinByPassword {
        /// Client joining.
        client_id: ClientId,
        /// Target room.
        room_id: ModelRoomId,
        /// Password submitted.
        password: PasswordChoice,
    },

    /// Client joins a room through its invite code.
    JoinByInvite {
        /// Client joining.
        client_id: ClientId,
        /// Target room.
        room_id: ModelRoomId,
    },

    /// Client leaves a room.
    Leave {
        /// Client leaving.
        client_id: ClientId,
        /// Room to leave.
        room_id: ModelRoomId,
    },

    /// Client reports an accuracy for the current round.
    RecordAccuracy {
        /// Client reporting.
        client_id: ClientId,
        /// Room reported in.
        room_id: ModelRoomId,
        /// Accuracy, 0-100.
        accuracy: u8,
    },

    /// Start a new round in a room.
    ResetAccuracy {
        /// Room to reset.
        room_id: ModelRoomId,
    },
}

impl Operation {
    /// Seats for a capacity selector.
    pub fn capacity_for(size_class: u8) -> usize {
        match size_class % 3 {
            0 => 2,
            1 => 4,
            _ => 6,
        }
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Room not found.
    RoomNotFound,

    /// Wrong or missing password for a secret room.
    PasswordMismatch,

    /// Password given for a public room.
    PasswordNotAllowed,

    /// Room at capacity.
    RoomFull,

    /// Client already in the room.
    AlreadyJoined,

    /// Client not in the room.
    NotJoined,

    /// Room id already used.
    DuplicateRoomName,

    /// Invalid client ID.
    InvalidClient,

    /// Anything the model never produces.
    Unexpected,
}

impl From<&ArenaError> for OperationError {
    fn from(err: &ArenaError) -> Self {
        match err {
            ArenaError::RoomNotFound(_) => Self::RoomNotFound,
            ArenaError::PasswordMismatch { .. } => Self::PasswordMismatch,
            ArenaError::PasswordNotAllowed { .. } => Self::PasswordNotAllowed,
            ArenaError::RoomFull { .. } => Self::RoomFull,
            ArenaError::AlreadyJoined { .. } => Self::AlreadyJoined,
            ArenaError::NotJoined { .. } => Self::NotJoined,
            ArenaError::DuplicateRoomName(_) => Self::DuplicateRoomName,
            _ => Self::Unexpected,
        }
    }
}

impl<T> From<Result<T, ArenaError>> for OperationResult {
    fn from(result: Result<T, ArenaError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(err) => Self::Error(OperationError::from(&err)),
        }
    }
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationResult::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}
