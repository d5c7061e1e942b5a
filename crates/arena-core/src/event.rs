//! Membership events and room channels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Member, RoomNo},
    ranking::level_of,
};

/// A room-scoped publish channel, `room/{roomNo}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    /// The channel for a room.
    pub fn room(room_no: RoomNo) -> Self {
        Self(format!("room/{room_no}"))
    }

    /// The channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload published after a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberJoined {
    /// Display name of the joiner.
    pub nickname: String,
    /// Joiner's level.
    pub level: u64,
    /// Exp toward the next level.
    pub remainder: u64,
    /// Whether the joiner now owns the room.
    pub is_owner: bool,
}

impl MemberJoined {
    /// Build the payload for a member, deriving the level from exp.
    pub fn new(member: &Member, is_owner: bool) -> Self {
        let level = level_of(member.exp);
        Self {
            nickname: member.nickname.clone(),
            level: level.level,
            remainder: level.remainder,
            is_owner,
        }
    }
}

/// Payload published after a member leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLeft {
    /// Display name of the leaver.
    pub nickname: String,
    /// Nickname of the member who inherited ownership, if any.
    pub new_owner: Option<String>,
}

/// Events published on a room channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomEvent {
    /// A member joined.
    Joined(MemberJoined),
    /// A member left.
    Left(MemberLeft),
}
