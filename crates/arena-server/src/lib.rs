//! Arena room membership server.
//!
//! This crate provides the runtime around the domain in `arena-core`:
//! - In-memory storage behind the collaborator ports
//! - Tokio broadcast fan-out for room events
//! - System time and cryptographic RNG
//!
//! ## Architecture
//!
//! ```text
//! arena-server
//!   ├─ SystemEnv              (production Environment impl)
//!   ├─ MemoryStore            (MemberDirectory + RoomCatalog + MembershipStore + ProblemCatalog)
//!   ├─ BroadcastPublisher     (room/{roomNo} fan-out)
//!   ├─ MembershipCoordinator  (admission, ownership, room lifecycle)
//!   ├─ RoomLocks              (per-room serialization)
//!   └─ MemberService          (sign-up, profile, leaderboard)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod invite;
mod members;
mod publisher;
mod room_locks;
pub mod storage;
mod system_env;

use std::sync::Arc;

use arena_core::{
    ArenaError, Capacity, Channel, Leaderboard, RoomEvent, RoomSpec, RoomSummary,
    ranking::DEFAULT_LEADERBOARD_SIZE,
};
pub use config::CoordinatorConfig;
pub use coordinator::{LeaveOutcome, MembershipCoordinator};
pub use error::ServerError;
pub use invite::InviteCodeResolver;
pub use members::{MemberProfile, MemberService};
pub use publisher::BroadcastPublisher;
pub use room_locks::RoomLocks;
pub use storage::MemoryStore;
pub use system_env::SystemEnv;
use tokio::{sync::broadcast::error::TryRecvError, task::JoinSet};

/// Contention drill parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrillConfig {
    /// Members racing to join the drill room.
    pub contenders: usize,
    /// Drill room capacity (2, 4 or 6).
    pub capacity: u8,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self { contenders: 5, capacity: 2 }
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Coordinator tunables (retries, invite code draws)
    pub coordinator: CoordinatorConfig,
    /// Rankers shown on the leaderboard
    pub leaderboard_size: usize,
    /// Per-channel event buffer
    pub channel_capacity: usize,
    /// Contention drill parameters
    pub drill: DrillConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            channel_capacity: 64,
            drill: DrillConfig::default(),
        }
    }
}

/// Coordinator type used by the production runtime.
pub type Coordinator = MembershipCoordinator<SystemEnv, MemoryStore, BroadcastPublisher>;

/// What the drill observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrillReport {
    /// Joins admitted.
    pub admitted: usize,
    /// Joins rejected because the room was full.
    pub rejected_full: usize,
    /// Joins rejected for any other reason.
    pub rejected_other: usize,
    /// Join events seen by the room subscriber.
    pub events: usize,
    /// Owners in the drill room afterwards.
    pub owners: usize,
    /// The room listing afterwards.
    pub listing: Vec<RoomSummary>,
    /// Leaderboard as seen by the first contender.
    pub leaderboard: Leaderboard,
}

/// Production Arena server.
///
/// Owns the shared store and publisher and the services built on them.
pub struct Server {
    store: Arc<MemoryStore>,
    publisher: Arc<BroadcastPublisher>,
    coordinator: Arc<Coordinator>,
    members: MemberService<MemoryStore>,
    config: ServerRuntimeConfig,
}

impl Server {
    /// Build a server over an empty in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the drill capacity is not a valid
    /// room size or there are no contenders.
    pub fn new(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if Capacity::try_from(config.drill.capacity).is_err() {
            return Err(ServerError::Config(format!(
                "drill capacity {} must be 2, 4 or 6",
                config.drill.capacity
            )));
        }
        if config.drill.contenders == 0 {
            return Err(ServerError::Config("drill needs at least one contender".to_string()));
        }

        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(BroadcastPublisher::new(config.channel_capacity));
        let coordinator = Arc::new(MembershipCoordinator::new(
            SystemEnv::new(),
            Arc::clone(&store),
            Arc::clone(&publisher),
            config.coordinator,
        ));
        let members = MemberService::new(Arc::clone(&store), config.leaderboard_size);

        Ok(Self { store, publisher, coordinator, members, config })
    }

    /// The membership coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// The member service.
    pub fn members(&self) -> &MemberService<MemoryStore> {
        &self.members
    }

    /// The event publisher.
    pub fn publisher(&self) -> &Arc<BroadcastPublisher> {
        &self.publisher
    }

    /// Run the contention drill: many members race into one small room.
    ///
    /// Seeds a problem and `contenders` members with increasing exp, creates
    /// the room, subscribes to its channel, fires every join at once on the
    /// blocking pool and reports what happened.
    ///
    /// # Errors
    ///
    /// Returns an error if seeding fails or a join task panics. Rejected
    /// joins are counted, not returned.
    pub async fn run_drill(&self) -> Result<DrillReport, ServerError> {
        let drill = self.config.drill;
        let problem = self.store.insert_problem("drill").map_err(ArenaError::from)?;

        let mut contenders = Vec::with_capacity(drill.contenders);
        for i in 0..drill.contenders {
            let username = format!("contender{i}");
            let user_no = self.members.sign_up(&username, &format!("Contender {i}"))?;
            let exp = u64::try_from(i).unwrap_or(u64::MAX).saturating_mul(60);
            self.store.award_exp(user_no, exp).map_err(ArenaError::from)?;
            contenders.push(self.members.resolve(&username)?);
        }

        let room = self.coordinator.create_room(
            RoomSpec {
                room_name: "drill".to_string(),
                is_secret: false,
                password: None,
                limit_member_cnt: drill.capacity,
            },
            problem.problem_no,
        )?;
        let mut events = self.publisher.subscribe(&Channel::room(room.room_no));
        tracing::info!(room_no = room.room_no, contenders = drill.contenders, "drill started");

        let mut joins = JoinSet::new();
        for member in contenders.iter().cloned() {
            let coordinator = Arc::clone(&self.coordinator);
            let room_no = room.room_no;
            joins.spawn_blocking(move || coordinator.join_by_password(room_no, None, &member));
        }

        let (mut admitted, mut rejected_full, mut rejected_other) = (0, 0, 0);
        while let Some(joined) = joins.join_next().await {
            match joined? {
                Ok(_) => admitted += 1,
                Err(ArenaError::RoomFull { .. }) => rejected_full += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "unexpected drill rejection");
                    rejected_other += 1;
                },
            }
        }

        let mut seen = 0;
        loop {
            match events.try_recv() {
                Ok(RoomEvent::Joined(joined)) => {
                    tracing::info!(
                        nickname = %joined.nickname,
                        level = joined.level,
                        is_owner = joined.is_owner,
                        "join event"
                    );
                    seen += 1;
                },
                Ok(RoomEvent::Left(_)) => {},
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "drill subscriber lagged");
                },
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        let owners =
            self.coordinator.members(room.room_no)?.iter().filter(|row| row.is_owner).count();
        let listing = self.coordinator.list_rooms()?;
        for summary in &listing {
            tracing::info!(
                room_no = summary.room.room_no,
                room_name = %summary.room.room_name,
                members = summary.member_count,
                capacity = summary.room.capacity.limit(),
                "room"
            );
        }

        let first = contenders
            .first()
            .ok_or_else(|| ServerError::Internal("no contenders".to_string()))?;
        let leaderboard = self.members.ranking(&first.username)?;
        for ranker in &leaderboard.top {
            tracing::info!(rank = ranker.rank, nickname = %ranker.nickname, "ranker");
        }
        tracing::info!(
            admitted,
            rejected_full,
            rejected_other,
            owners,
            user_rank = leaderboard.user_rank,
            "drill finished"
        );

        Ok(DrillReport {
            admitted,
            rejected_full,
            rejected_other,
            events: seen,
            owners,
            listing,
            leaderboard,
        })
    }
}
