//! Domain records.
//!
//! Plain data owned by the collaborators: members by the directory, rooms by
//! the catalog, join rows by the membership store. Records only reference each
//! other by number; lifecycle control never crosses an ownership boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{env::Environment, error::ArenaError};

/// Member identifier.
pub type UserNo = u64;

/// Room identifier.
pub type RoomNo = u64;

/// Problem identifier.
pub type ProblemNo = u64;

/// Length of a secret room password.
pub const PASSWORD_LEN: usize = 4;

/// Length of an invite code in hex characters.
pub const INVITE_CODE_LEN: usize = 8;

/// A registered member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Stable identifier.
    pub user_no: UserNo,
    /// Login key (unique).
    pub username: String,
    /// Display key (unique).
    pub nickname: String,
    /// Cumulative experience. Never decreases.
    pub exp: u64,
}

/// Sign-up request for a new member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    /// Login key.
    pub username: String,
    /// Display key.
    pub nickname: String,
}

/// A problem a room competes on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// Stable identifier.
    pub problem_no: ProblemNo,
    /// Problem title.
    pub title: String,
}

/// Allowed room sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capacity {
    /// Head-to-head.
    Two,
    /// Four players.
    Four,
    /// Six players.
    Six,
}

impl Capacity {
    /// Maximum number of members.
    pub fn limit(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
            Self::Six => 6,
        }
    }
}

impl TryFrom<u8> for Capacity {
    type Error = ArenaError;

    fn try_from(requested: u8) -> Result<Self, Self::Error> {
        match requested {
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            6 => Ok(Self::Six),
            _ => Err(ArenaError::InvalidCapacity { requested }),
        }
    }
}

/// How a room is entered without an invite code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomAccess {
    /// Anyone may join, and must not supply a password.
    Public,
    /// Joiners must supply the password.
    Secret {
        /// Exactly [`PASSWORD_LEN`] ASCII digits.
        password: String,
    },
}

impl RoomAccess {
    /// Build access rules from a creation request.
    ///
    /// A password supplied for a public room is discarded; a secret room's
    /// password must be exactly four ASCII digits.
    pub fn from_request(is_secret: bool, password: Option<&str>) -> Result<Self, ArenaError> {
        if !is_secret {
            return Ok(Self::Public);
        }

        let password = password
            .ok_or(ArenaError::InvalidPassword { reason: "secret rooms require a password" })?;
        if password.is_empty() || !password.chars().all(|c| c.is_ascii_digit()) {
            return Err(ArenaError::InvalidPassword { reason: "password must be numeric" });
        }
        if password.len() != PASSWORD_LEN {
            return Err(ArenaError::InvalidPassword { reason: "password must be 4 digits" });
        }

        Ok(Self::Secret { password: password.to_owned() })
    }

    /// Whether the room is secret.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret { .. })
    }
}

/// Short token granting secrecy-bypassing entry to a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Draw a fresh code from the environment's RNG.
    pub fn generate<E: Environment>(env: &E) -> Self {
        Self(format!("{:08x}", env.random_u32()))
    }

    /// Parse user input. Accepts eight hex digits in either case and
    /// surrounding whitespace; anything else cannot name a room.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != INVITE_CODE_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(trimmed.to_ascii_lowercase()))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room creation request as received from the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSpec {
    /// Unique room name.
    pub room_name: String,
    /// Whether joining by number requires a password.
    pub is_secret: bool,
    /// Password for secret rooms.
    pub password: Option<String>,
    /// Requested capacity; must be 2, 4 or 6.
    pub limit_member_cnt: u8,
}

/// A validated room, ready for the catalog to number and store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    /// Unique room name.
    pub room_name: String,
    /// Entry rules.
    pub access: RoomAccess,
    /// Unique invite code.
    pub invite_code: InviteCode,
    /// Member limit.
    pub capacity: Capacity,
    /// Linked problem.
    pub problem_no: ProblemNo,
}

/// A room definition. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Stable identifier.
    pub room_no: RoomNo,
    /// Unique room name.
    pub room_name: String,
    /// Entry rules.
    pub access: RoomAccess,
    /// Unique invite code.
    pub invite_code: InviteCode,
    /// Member limit.
    pub capacity: Capacity,
    /// Linked problem.
    pub problem_no: ProblemNo,
}

impl Room {
    /// Whether the room is secret.
    pub fn is_secret(&self) -> bool {
        self.access.is_secret()
    }

    /// Check a password supplied on the direct-join path.
    ///
    /// Secret rooms require an exact match. Public rooms reject any
    /// non-empty password.
    pub fn check_password(&self, supplied: Option<&str>) -> Result<(), ArenaError> {
        match (&self.access, supplied) {
            (RoomAccess::Secret { password }, Some(supplied)) if supplied == password => Ok(()),
            (RoomAccess::Secret { .. }, _) => {
                Err(ArenaError::PasswordMismatch { room_no: self.room_no })
            },
            (RoomAccess::Public, Some(supplied)) if !supplied.is_empty() => {
                Err(ArenaError::PasswordNotAllowed { room_no: self.room_no })
            },
            (RoomAccess::Public, _) => Ok(()),
        }
    }
}

/// Join record binding one member to one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    /// Room joined.
    pub room_no: RoomNo,
    /// Member who joined.
    pub user_no: UserNo,
    /// Whether this member owns the room.
    pub is_owner: bool,
    /// Best accuracy reported this round.
    pub accuracy: u32,
    /// Store-wide join sequence, assigned on insert.
    pub joined_seq: u64,
}

impl RoomMember {
    /// A fresh join row. `joined_seq` is assigned by the store.
    pub fn new(room_no: RoomNo, user_no: UserNo, is_owner: bool) -> Self {
        Self { room_no, user_no, is_owner, accuracy: 0, joined_seq: 0 }
    }

    /// Keep the better of the current and reported accuracy.
    pub fn record_accuracy(&mut self, accuracy: u32) {
        self.accuracy = self.accuracy.max(accuracy);
    }

    /// Start a new round.
    pub fn reset_accuracy(&mut self) {
        self.accuracy = 0;
    }
}

/// A room together with its problem, returned from joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    /// The room joined.
    pub room: Room,
    /// The room's problem.
    pub problem: Problem,
}

/// One entry of the room listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// The room.
    pub room: Room,
    /// Members currently joined.
    pub member_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(access: RoomAccess) -> Room {
        Room {
            room_no: 7,
            room_name: "arena".to_string(),
            access,
            invite_code: InviteCode("0badf00d".to_string()),
            capacity: Capacity::Four,
            problem_no: 1,
        }
    }

    #[test]
    fn capacity_accepts_only_even_sizes() {
        assert_eq!(Capacity::try_from(2).unwrap().limit(), 2);
        assert_eq!(Capacity::try_from(4).unwrap().limit(), 4);
        assert_eq!(Capacity::try_from(6).unwrap().limit(), 6);
        for requested in [0, 1, 3, 5, 7, 8, 255] {
            assert_eq!(
                Capacity::try_from(requested),
                Err(ArenaError::InvalidCapacity { requested })
            );
        }
    }

    #[test]
    fn secret_access_requires_four_digits() {
        assert!(matches!(
            RoomAccess::from_request(true, Some("12a3")),
            Err(ArenaError::InvalidPassword { .. })
        ));
        assert!(matches!(
            RoomAccess::from_request(true, Some("123")),
            Err(ArenaError::InvalidPassword { .. })
        ));
        assert!(matches!(
            RoomAccess::from_request(true, Some("12345")),
            Err(ArenaError::InvalidPassword { .. })
        ));
        assert!(matches!(
            RoomAccess::from_request(true, Some("-123")),
            Err(ArenaError::InvalidPassword { .. })
        ));
        assert!(matches!(
            RoomAccess::from_request(true, None),
            Err(ArenaError::InvalidPassword { .. })
        ));
        assert_eq!(
            RoomAccess::from_request(true, Some("0420")),
            Ok(RoomAccess::Secret { password: "0420".to_string() })
        );
    }

    #[test]
    fn public_access_discards_password() {
        assert_eq!(RoomAccess::from_request(false, Some("1234")), Ok(RoomAccess::Public));
        assert_eq!(RoomAccess::from_request(false, None), Ok(RoomAccess::Public));
    }

    #[test]
    fn secret_room_password_check() {
        let room = room(RoomAccess::Secret { password: "1234".to_string() });
        assert!(room.check_password(Some("1234")).is_ok());
        assert_eq!(
            room.check_password(Some("4321")),
            Err(ArenaError::PasswordMismatch { room_no: 7 })
        );
        assert_eq!(room.check_password(None), Err(ArenaError::PasswordMismatch { room_no: 7 }));
    }

    #[test]
    fn public_room_password_check() {
        let room = room(RoomAccess::Public);
        assert!(room.check_password(None).is_ok());
        assert!(room.check_password(Some("")).is_ok());
        assert_eq!(
            room.check_password(Some("1234")),
            Err(ArenaError::PasswordNotAllowed { room_no: 7 })
        );
    }

    #[test]
    fn invite_code_parse_normalizes() {
        assert_eq!(InviteCode::parse(" 0BADF00D ").unwrap().as_str(), "0badf00d");
        assert!(InviteCode::parse("0badf00").is_none());
        assert!(InviteCode::parse("0badf00dd").is_none());
        assert!(InviteCode::parse("0badf0zz").is_none());
        assert!(InviteCode::parse("").is_none());
    }

    #[test]
    fn accuracy_is_monotonic_max() {
        let mut row = RoomMember::new(1, 2, false);
        row.record_accuracy(40);
        row.record_accuracy(25);
        assert_eq!(row.accuracy, 40);
        row.record_accuracy(90);
        assert_eq!(row.accuracy, 90);
        row.reset_accuracy();
        assert_eq!(row.accuracy, 0);
    }
}
