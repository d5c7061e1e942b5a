//! Levels and leaderboards.
//!
//! Pure functions over member exp. Every caller that shows a level (profile,
//! join notification) goes through [`level_of`] so the boundary is decided in
//! exactly one place.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::domain::Member;

/// Exp per level.
pub const LEVEL_SPAN: u64 = 100;

/// Number of rankers shown on the leaderboard.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 5;

/// Display tier derived from exp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Level, starting at 1.
    pub level: u64,
    /// Exp shown toward the next level.
    pub remainder: u64,
}

/// Derive a level from cumulative exp.
///
/// Up to and including [`LEVEL_SPAN`] exp a member stays at level 1 with the
/// full exp as remainder, so `level_of(100)` is `(1, 100)` and `level_of(101)`
/// is `(2, 1)`.
pub fn level_of(exp: u64) -> Level {
    if exp > LEVEL_SPAN {
        Level { level: exp / LEVEL_SPAN + 1, remainder: exp % LEVEL_SPAN }
    } else {
        Level { level: 1, remainder: exp }
    }
}

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranker {
    /// Display name.
    pub nickname: String,
    /// 1-based rank.
    pub rank: usize,
}

/// Leaderboard as seen by one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    /// Top members by descending exp.
    pub top: Vec<Ranker>,
    /// The querying member's 1-based rank over the whole population.
    pub user_rank: usize,
}

/// Build the leaderboard for `member` over `all`.
///
/// Members are ordered by descending exp; equal exp is ordered by ascending
/// `user_no`. Returns `None` if `member` is not part of `all`.
///
/// Sorts the whole population on every call.
pub fn ranking_for(member: &Member, all: &[Member], top_n: usize) -> Option<Leaderboard> {
    let mut ordered: Vec<&Member> = all.iter().collect();
    ordered.sort_by_key(|m| (Reverse(m.exp), m.user_no));

    let position = ordered.iter().position(|m| m.user_no == member.user_no)?;
    let top = ordered
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, m)| Ranker { nickname: m.nickname.clone(), rank: i + 1 })
        .collect();

    Some(Leaderboard { top, user_rank: position + 1 })
}
