//! Deterministic simulation harness for Arena membership testing.
//!
//! Seeded implementations of the Environment and storage traits for
//! reproducible testing under injected storage faults.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of room
//! membership. Operations are applied to both the model and the real
//! coordinator, and their results and observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaotic;
pub mod model;
pub mod sim_env;

pub use chaotic::ChaoticStore;
pub use model::{
    ClientId, ModelMember, ModelRoom, ModelRoomId, ModelWorld, ObservableState, Operation,
    OperationError, OperationResult, PasswordChoice,
};
pub use sim_env::SimEnv;
