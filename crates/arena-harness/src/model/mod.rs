//! Reference model for model-based testing.
//!
//! The model is a simplified implementation of room membership: rooms are
//! vectors of members in join order, nothing is concurrent and nothing
//! fails for infrastructure reasons. It serves as the oracle against which
//! the real coordinator is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Rules not mechanics: Captures admission and ownership, not locking
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod world;

pub use operation::{
    ClientId, ModelRoomId, Operation, OperationError, OperationResult, PasswordChoice,
};
pub use world::{ModelMember, ModelRoom, ModelWorld, ObservableState};
