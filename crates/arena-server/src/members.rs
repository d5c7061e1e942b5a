//! Member service: sign-up, nickname changes, profiles and the leaderboard.

use std::sync::Arc;

use arena_core::{
    ArenaError, Leaderboard, Member, MemberDirectory, NewMember, PrincipalResolver, StorageError,
    UserNo, level_of, ranking_for,
};

/// A member as shown on their profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    /// Stable identifier.
    pub user_no: UserNo,
    /// Login key.
    pub username: String,
    /// Display key.
    pub nickname: String,
    /// Level derived from exp.
    pub level: u64,
    /// Exp toward the next level.
    pub remainder: u64,
}

/// Operations on member identities, backed by a [`MemberDirectory`].
#[derive(Debug)]
pub struct MemberService<D> {
    directory: Arc<D>,
    leaderboard_size: usize,
}

impl<D> Clone for MemberService<D> {
    fn clone(&self) -> Self {
        Self { directory: Arc::clone(&self.directory), leaderboard_size: self.leaderboard_size }
    }
}

impl<D: MemberDirectory> MemberService<D> {
    /// Create a service showing `leaderboard_size` rankers.
    pub fn new(directory: Arc<D>, leaderboard_size: usize) -> Self {
        Self { directory, leaderboard_size }
    }

    /// Register a new member with zero exp.
    ///
    /// # Errors
    ///
    /// - `ArenaError::DuplicateNickname` if the nickname is taken (checked first)
    /// - `ArenaError::DuplicateUsername` if the username is taken
    pub fn sign_up(&self, username: &str, nickname: &str) -> Result<UserNo, ArenaError> {
        if self.directory.exists_by_nickname(nickname)? {
            return Err(ArenaError::DuplicateNickname(nickname.to_string()));
        }
        if self.directory.exists_by_username(username)? {
            return Err(ArenaError::DuplicateUsername(username.to_string()));
        }

        let member = self
            .directory
            .save_member(NewMember {
                username: username.to_string(),
                nickname: nickname.to_string(),
            })
            .map_err(directory_error)?;

        tracing::info!(user_no = member.user_no, %username, "member signed up");
        Ok(member.user_no)
    }

    /// Change a member's nickname. Keeping the current nickname is a no-op
    /// rename, not a conflict.
    ///
    /// # Errors
    ///
    /// - `ArenaError::MemberNotFound` if nobody holds `username`
    /// - `ArenaError::DuplicateNickname` if another member holds the nickname
    pub fn rename(&self, username: &str, nickname: &str) -> Result<UserNo, ArenaError> {
        let member = self.resolve(username)?;
        if member.nickname != nickname && self.directory.exists_by_nickname(nickname)? {
            return Err(ArenaError::DuplicateNickname(nickname.to_string()));
        }

        let member =
            self.directory.update_nickname(member.user_no, nickname).map_err(directory_error)?;
        tracing::debug!(user_no = member.user_no, %nickname, "nickname changed");
        Ok(member.user_no)
    }

    /// A member's profile with their level.
    ///
    /// # Errors
    ///
    /// Returns `ArenaError::MemberNotFound` if nobody holds `username`.
    pub fn profile(&self, username: &str) -> Result<MemberProfile, ArenaError> {
        let member = self.resolve(username)?;
        let level = level_of(member.exp);
        Ok(MemberProfile {
            user_no: member.user_no,
            username: member.username,
            nickname: member.nickname,
            level: level.level,
            remainder: level.remainder,
        })
    }

    /// The leaderboard as seen by one member.
    ///
    /// # Errors
    ///
    /// Returns `ArenaError::MemberNotFound` if nobody holds `username`, or if
    /// the member vanished from the directory between lookup and listing.
    pub fn ranking(&self, username: &str) -> Result<Leaderboard, ArenaError> {
        let member = self.resolve(username)?;
        let all = self.directory.list_members()?;
        ranking_for(&member, &all, self.leaderboard_size)
            .ok_or_else(|| ArenaError::MemberNotFound(username.to_string()))
    }

    /// Resolve a login key to its member.
    ///
    /// # Errors
    ///
    /// Returns `ArenaError::MemberNotFound` if nobody holds `username`.
    pub fn resolve(&self, username: &str) -> Result<Member, ArenaError> {
        self.directory
            .find_by_username(username)?
            .ok_or_else(|| ArenaError::MemberNotFound(username.to_string()))
    }
}

impl<D: MemberDirectory> PrincipalResolver for MemberService<D> {
    fn resolve(&self, principal: &str) -> Result<Member, ArenaError> {
        Self::resolve(self, principal)
    }
}

/// Constraint violations that slipped past the existence checks are still
/// user errors.
fn directory_error(err: StorageError) -> ArenaError {
    match err {
        StorageError::DuplicateNickname(nickname) => ArenaError::DuplicateNickname(nickname),
        StorageError::DuplicateUsername(username) => ArenaError::DuplicateUsername(username),
        StorageError::MemberNotFound(user_no) => ArenaError::MemberNotFound(user_no.to_string()),
        other => ArenaError::Storage(other),
    }
}
