//! Core identifier and history types.
//!
//! This module contains the parts of a state machine that carry no
//! behavior:
//! - Identifier definitions via the `StateId` trait
//! - Bounded transition history
//!
//! Behavior (state handlers, the engine loop) lives in [`crate::engine`].

mod history;
mod state;

pub use history::{StateHistory, StateTransition, DEFAULT_HISTORY_CAPACITY};
pub use state::StateId;
