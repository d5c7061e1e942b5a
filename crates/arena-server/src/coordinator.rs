//! Membership Coordinator
//!
//! Admits or rejects joins against one room as an atomic unit and keeps the
//! room's ownership consistent as members come and go.
//!
//! ## Responsibilities
//!
//! - Room Lifecycle: Validate and create rooms with unique invite codes
//! - Admission: Password and invite-code joins, capacity, duplicates
//! - Ownership: First password joiner owns an empty room; ownership passes to
//!   the earliest remaining joiner when the owner leaves
//! - Notification: Publish membership events on `room/{roomNo}`
//!
//! ## Design
//!
//! - Every mutation of a room's rows runs inside [`RoomLocks::serialize`], so
//!   the count read, the duplicate check and the insert see one view.
//! - The store re-checks capacity and uniqueness on insert. The lock keeps
//!   honest callers consistent; the constraint catches everyone else.
//! - Multi-row mutations go through a unit of work that undoes applied steps
//!   if it is dropped before commit.

use std::sync::Arc;

use arena_core::{
    ArenaError, Capacity, Channel, Environment, InviteCode, Member, MemberJoined, MemberLeft,
    NewRoom, NotificationPublisher, Problem, ProblemNo, Room, RoomAccess, RoomEvent, RoomLookup,
    RoomMember, RoomNo, RoomSpec, RoomSummary, RoomView, StorageError, Store, UserNo,
};

use crate::{config::CoordinatorConfig, invite::InviteCodeResolver, room_locks::RoomLocks};

/// Which door a join came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinPath {
    Password,
    InviteCode,
}

/// Result of a successful leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The row that was removed.
    pub removed: RoomMember,
    /// Member who inherited ownership, if the owner left a non-empty room.
    pub new_owner: Option<UserNo>,
}

/// Orchestrates room creation, admission and ownership.
pub struct MembershipCoordinator<E, S, P>
where
    E: Environment,
    S: Store,
    P: NotificationPublisher,
{
    env: E,
    store: Arc<S>,
    publisher: Arc<P>,
    locks: RoomLocks,
    invites: InviteCodeResolver<S>,
    config: CoordinatorConfig,
}

impl<E, S, P> MembershipCoordinator<E, S, P>
where
    E: Environment,
    S: Store,
    P: NotificationPublisher,
{
    /// Create a coordinator over a store and publisher.
    pub fn new(env: E, store: Arc<S>, publisher: Arc<P>, config: CoordinatorConfig) -> Self {
        let invites = InviteCodeResolver::new(Arc::clone(&store));
        Self { env, store, publisher, locks: RoomLocks::new(), invites, config }
    }

    /// Join a room by number.
    ///
    /// The joiner owns the room if nobody was in it.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - `ArenaError::RoomNotFound` if no room has this number
    /// - `ArenaError::PasswordMismatch` for a secret room and a wrong or
    ///   missing password
    /// - `ArenaError::PasswordNotAllowed` for a public room and a non-empty
    ///   password
    /// - `ArenaError::RoomFull` if the room is at capacity
    /// - `ArenaError::AlreadyJoined` if the member already has a row here
    pub fn join_by_password(
        &self,
        room_no: RoomNo,
        password: Option<&str>,
        member: &Member,
    ) -> Result<RoomView, ArenaError> {
        let room = self.find_room(room_no)?;
        if let Err(err) = room.check_password(password) {
            tracing::debug!(
                room_no,
                user_no = member.user_no,
                kind = err.kind().code(),
                "join rejected"
            );
            return Err(err);
        }
        self.admit(&room, member, JoinPath::Password)
    }

    /// Join a room through its invite code.
    ///
    /// Bypasses the password of secret rooms. Invite joiners never become
    /// owner, even of an empty room.
    ///
    /// # Errors
    ///
    /// - `ArenaError::RoomNotFound` if the code resolves to no room
    /// - `ArenaError::RoomFull` if the room is at capacity
    /// - `ArenaError::AlreadyJoined` if the member already has a row here
    pub fn join_by_invite_code(&self, code: &str, member: &Member) -> Result<RoomView, ArenaError> {
        let room = self.invites.resolve(code)?;
        self.admit(&room, member, JoinPath::InviteCode)
    }

    /// Validate and store a new room linked to a problem.
    ///
    /// A password given for a public room is discarded. The room starts
    /// empty; its creator joins like anyone else.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - `ArenaError::DuplicateRoomName` if the name is taken
    /// - `ArenaError::InvalidPassword` if a secret room's password is not
    ///   exactly four ASCII digits
    /// - `ArenaError::InvalidCapacity` if the limit is not 2, 4 or 6
    /// - `ArenaError::ProblemNotFound` if the problem does not exist
    /// - `ArenaError::Storage` if no free invite code was drawn within
    ///   `invite_code_attempts`
    pub fn create_room(&self, spec: RoomSpec, problem_no: ProblemNo) -> Result<Room, ArenaError> {
        if self.store.exists_by_name(&spec.room_name)? {
            return Err(ArenaError::DuplicateRoomName(spec.room_name));
        }
        let access = RoomAccess::from_request(spec.is_secret, spec.password.as_deref())?;
        let capacity = Capacity::try_from(spec.limit_member_cnt)?;
        if self.store.find_by_problem_no(problem_no)?.is_none() {
            return Err(ArenaError::ProblemNotFound(problem_no));
        }

        let attempts = self.config.invite_code_attempts.max(1);
        for attempt in 1..=attempts {
            let room = NewRoom {
                room_name: spec.room_name.clone(),
                access: access.clone(),
                invite_code: InviteCode::generate(&self.env),
                capacity,
                problem_no,
            };

            match self.store.save_room(room) {
                Ok(room) => {
                    tracing::info!(
                        room_no = room.room_no,
                        room_name = %room.room_name,
                        capacity = capacity.limit(),
                        secret = room.is_secret(),
                        "room created"
                    );
                    return Ok(room);
                },
                Err(StorageError::DuplicateInviteCode(code)) => {
                    tracing::warn!(attempt, %code, "invite code collision, drawing another");
                },
                Err(StorageError::DuplicateRoomName(name)) => {
                    return Err(ArenaError::DuplicateRoomName(name));
                },
                Err(err) => return Err(err.into()),
            }
        }

        tracing::error!(attempts, "no free invite code");
        Err(StorageError::Unavailable(format!("no free invite code after {attempts} attempts"))
            .into())
    }

    /// Every room with its current member count, ascending by room number.
    ///
    /// Counts are read without the room locks; each is a whole-row snapshot
    /// but the list as a whole is not one instant.
    pub fn list_rooms(&self) -> Result<Vec<RoomSummary>, ArenaError> {
        self.store
            .list_rooms()?
            .into_iter()
            .map(|room| {
                let member_count = self.store.count_for(room.room_no)?;
                Ok::<_, ArenaError>(RoomSummary { room, member_count })
            })
            .collect()
    }

    /// Leave a room.
    ///
    /// If the owner leaves and members remain, ownership passes to the
    /// member who joined earliest. The owner flag moves in two row updates,
    /// so a lock-free reader such as [`members`](Self::members) may briefly
    /// see the room with no owner.
    ///
    /// # Errors
    ///
    /// - `ArenaError::RoomNotFound` if no room has this number
    /// - `ArenaError::NotJoined` if the member has no row here
    pub fn leave(&self, room_no: RoomNo, member: &Member) -> Result<LeaveOutcome, ArenaError> {
        let room = self.find_room(room_no)?;
        self.locks.serialize(room.room_no, || {
            let rows = self.store.list_for(room_no)?;
            let leaver = rows
                .iter()
                .find(|row| row.user_no == member.user_no)
                .cloned()
                .ok_or(ArenaError::NotJoined { room_no, user_no: member.user_no })?;

            let heir = if leaver.is_owner {
                rows.iter()
                    .filter(|row| row.user_no != leaver.user_no)
                    .min_by_key(|row| row.joined_seq)
                    .map(|row| row.user_no)
            } else {
                None
            };
            // Resolved before any write so a failed lookup changes nothing.
            let heir_nickname = match heir {
                Some(heir) => self.store.find_by_user_no(heir)?.map(|m| m.nickname),
                None => None,
            };

            let mut work = UnitOfWork::new(self.store.as_ref(), room_no);
            if let Some(heir) = heir {
                work.set_owner(leaver.user_no, false)?;
                work.set_owner(heir, true)?;
            }
            self.store
                .remove(room_no, leaver.user_no)
                .map_err(|err| membership_error(err, room_no, member.user_no))?;
            work.commit();

            self.publisher.publish(
                &Channel::room(room_no),
                RoomEvent::Left(MemberLeft {
                    nickname: member.nickname.clone(),
                    new_owner: heir_nickname,
                }),
            );

            tracing::info!(room_no, user_no = member.user_no, new_owner = ?heir, "member left");
            Ok(LeaveOutcome { removed: leaver, new_owner: heir })
        })
    }

    /// Report an accuracy for the current round. The best report is kept.
    ///
    /// Returns the stored accuracy.
    ///
    /// # Errors
    ///
    /// Returns `ArenaError::NotJoined` if the member has no row in the room,
    /// including when the room does not exist.
    pub fn record_accuracy(
        &self,
        room_no: RoomNo,
        member: &Member,
        accuracy: u32,
    ) -> Result<u32, ArenaError> {
        let Some(room) = self.store.find_room(room_no)? else {
            return Err(ArenaError::NotJoined { room_no, user_no: member.user_no });
        };
        self.locks.serialize(room.room_no, || {
            let row = self
                .store
                .update(room_no, member.user_no, &mut |row| row.record_accuracy(accuracy))
                .map_err(|err| membership_error(err, room_no, member.user_no))?;
            tracing::debug!(
                room_no,
                user_no = member.user_no,
                accuracy = row.accuracy,
                "accuracy recorded"
            );
            Ok(row.accuracy)
        })
    }

    /// Start a new round: every member's accuracy goes back to zero.
    ///
    /// All rows are reset or none are. Returns the number of rows reset.
    /// Rows are written one at a time, so a lock-free reader may see a
    /// partially reset room until the call returns.
    ///
    /// # Errors
    ///
    /// Returns `ArenaError::RoomNotFound` if no room has this number.
    pub fn reset_accuracy(&self, room_no: RoomNo) -> Result<usize, ArenaError> {
        let room = self.find_room(room_no)?;
        self.locks.serialize(room.room_no, || {
            let rows = self.store.list_for(room_no)?;
            let mut work = UnitOfWork::new(self.store.as_ref(), room_no);
            for row in &rows {
                work.reset_accuracy(row.user_no)?;
            }
            work.commit();

            tracing::debug!(room_no, rows = rows.len(), "accuracy reset");
            Ok(rows.len())
        })
    }

    /// A room's rows in join order.
    ///
    /// # Errors
    ///
    /// Returns `ArenaError::RoomNotFound` if no room has this number.
    pub fn members(&self, room_no: RoomNo) -> Result<Vec<RoomMember>, ArenaError> {
        let room = self.find_room(room_no)?;
        let mut rows = self.store.list_for(room.room_no)?;
        rows.sort_by_key(|row| row.joined_seq);
        Ok(rows)
    }

    /// A room with its problem.
    ///
    /// # Errors
    ///
    /// - `ArenaError::RoomNotFound` if no room has this number
    /// - `ArenaError::ProblemNotFound` if the room's problem is gone
    pub fn room(&self, room_no: RoomNo) -> Result<RoomView, ArenaError> {
        let room = self.find_room(room_no)?;
        let problem = self.problem_for(&room)?;
        Ok(RoomView { room, problem })
    }

    fn find_room(&self, room_no: RoomNo) -> Result<Room, ArenaError> {
        self.store
            .find_room(room_no)?
            .ok_or(ArenaError::RoomNotFound(RoomLookup::Number(room_no)))
    }

    fn problem_for(&self, room: &Room) -> Result<Problem, ArenaError> {
        self.store
            .find_by_problem_no(room.problem_no)?
            .ok_or(ArenaError::ProblemNotFound(room.problem_no))
    }

    /// Insert the member's row and announce it, all under the room lock.
    fn admit(&self, room: &Room, member: &Member, path: JoinPath) -> Result<RoomView, ArenaError> {
        let result: Result<RoomView, ArenaError> = self.locks.serialize(room.room_no, || {
            let problem = self.problem_for(room)?;
            let row = self.check_and_insert(room, member, path)?;

            self.publisher.publish(
                &Channel::room(room.room_no),
                RoomEvent::Joined(MemberJoined::new(member, row.is_owner)),
            );
            tracing::info!(
                room_no = room.room_no,
                user_no = member.user_no,
                is_owner = row.is_owner,
                ?path,
                "member joined"
            );
            Ok(RoomView { room: room.clone(), problem })
        });

        if let Err(err) = &result {
            tracing::debug!(
                room_no = room.room_no,
                user_no = member.user_no,
                kind = err.kind().code(),
                "join rejected"
            );
        }
        result
    }

    /// Retry the admission step on transient store conflicts.
    fn check_and_insert(
        &self,
        room: &Room,
        member: &Member,
        path: JoinPath,
    ) -> Result<RoomMember, ArenaError> {
        let attempts = self.config.max_admission_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_insert(room, member, path) {
                Err(ArenaError::Storage(err)) if err.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        room_no = room.room_no,
                        user_no = member.user_no,
                        attempt,
                        error = %err,
                        "transient conflict on admission, retrying"
                    );
                    attempt += 1;
                },
                other => return other,
            }
        }
    }

    fn try_insert(
        &self,
        room: &Room,
        member: &Member,
        path: JoinPath,
    ) -> Result<RoomMember, ArenaError> {
        let capacity = room.capacity.limit();
        let count = self.store.count_for(room.room_no)?;
        if count >= capacity {
            return Err(ArenaError::RoomFull { room_no: room.room_no, capacity });
        }
        if self.store.exists_for(room.room_no, member.user_no)? {
            return Err(ArenaError::AlreadyJoined {
                room_no: room.room_no,
                user_no: member.user_no,
            });
        }

        let is_owner = path == JoinPath::Password && count == 0;
        self.store
            .insert(RoomMember::new(room.room_no, member.user_no, is_owner), room.capacity)
            .map_err(admission_error)
    }
}

/// Constraint violations on insert are the same user errors the pre-checks
/// report.
fn admission_error(err: StorageError) -> ArenaError {
    match err {
        StorageError::DuplicateMembership { room_no, user_no } => {
            ArenaError::AlreadyJoined { room_no, user_no }
        },
        StorageError::CapacityExceeded { room_no, capacity } => {
            ArenaError::RoomFull { room_no, capacity }
        },
        other => ArenaError::Storage(other),
    }
}

fn membership_error(err: StorageError, room_no: RoomNo, user_no: UserNo) -> ArenaError {
    match err {
        StorageError::MembershipNotFound { .. } => ArenaError::NotJoined { room_no, user_no },
        other => ArenaError::Storage(other),
    }
}

/// A step already applied, and how to reverse it.
#[derive(Debug)]
enum Undo {
    SetOwner { user_no: UserNo, is_owner: bool },
    SetAccuracy { user_no: UserNo, accuracy: u32 },
}

/// Row updates within one room that apply together or not at all.
///
/// Each step is written immediately and its inverse recorded. Dropping the
/// unit without [`commit`](Self::commit) replays the inverses, newest first.
struct UnitOfWork<'a, S: Store> {
    store: &'a S,
    room_no: RoomNo,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a, S: Store> UnitOfWork<'a, S> {
    fn new(store: &'a S, room_no: RoomNo) -> Self {
        Self { store, room_no, undo: Vec::new(), committed: false }
    }

    fn set_owner(&mut self, user_no: UserNo, is_owner: bool) -> Result<(), ArenaError> {
        let mut previous = false;
        self.store
            .update(self.room_no, user_no, &mut |row| {
                previous = row.is_owner;
                row.is_owner = is_owner;
            })
            .map_err(|err| membership_error(err, self.room_no, user_no))?;
        self.undo.push(Undo::SetOwner { user_no, is_owner: previous });
        Ok(())
    }

    fn reset_accuracy(&mut self, user_no: UserNo) -> Result<(), ArenaError> {
        let mut previous = 0;
        self.store
            .update(self.room_no, user_no, &mut |row| {
                previous = row.accuracy;
                row.reset_accuracy();
            })
            .map_err(|err| membership_error(err, self.room_no, user_no))?;
        self.undo.push(Undo::SetAccuracy { user_no, accuracy: previous });
        Ok(())
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<S: Store> Drop for UnitOfWork<'_, S> {
    fn drop(&mut self) {
        if self.committed || self.undo.is_empty() {
            return;
        }

        tracing::warn!(room_no = self.room_no, steps = self.undo.len(), "rolling back");
        while let Some(step) = self.undo.pop() {
            let result = match step {
                Undo::SetOwner { user_no, is_owner } => {
                    self.store.update(self.room_no, user_no, &mut |row| row.is_owner = is_owner)
                },
                Undo::SetAccuracy { user_no, accuracy } => {
                    self.store.update(self.room_no, user_no, &mut |row| row.accuracy = accuracy)
                },
            };
            if let Err(err) = result {
                tracing::error!(room_no = self.room_no, error = %err, "rollback step failed");
            }
        }
    }
}
