//! Arena core.
//!
//! Domain records, collaborator ports and the pure ranking rules shared by
//! the coordinator and its test harness.
//!
//! ## Architecture
//!
//! ```text
//! arena-core
//!   ├─ domain      (Member, Room, RoomMember, Problem, InviteCode)
//!   ├─ env         (time + randomness abstraction)
//!   ├─ error       (ArenaError, ErrorKind)
//!   ├─ event       (room channels and membership events)
//!   ├─ ports       (MemberDirectory, RoomCatalog, MembershipStore, ...)
//!   └─ ranking     (level_of, ranking_for)
//! ```
//!
//! Nothing in this crate performs I/O. Storage and fan-out are reached only
//! through the traits in [`ports`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod domain;
pub mod env;
pub mod error;
pub mod event;
pub mod ports;
pub mod ranking;

pub use domain::{
    Capacity, InviteCode, Member, NewMember, NewRoom, Problem, ProblemNo, Room, RoomAccess,
    RoomMember, RoomNo, RoomSpec, RoomSummary, RoomView, UserNo,
};
pub use env::Environment;
pub use error::{ArenaError, ErrorKind, RoomLookup};
pub use event::{Channel, MemberJoined, MemberLeft, RoomEvent};
pub use ports::{
    MemberDirectory, MembershipStore, NotificationPublisher, PrincipalResolver, ProblemCatalog,
    RoomCatalog, StorageError, Store,
};
pub use ranking::{Leaderboard, Level, Ranker, level_of, ranking_for};
