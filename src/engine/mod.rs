//! Reusable state machine engine.
//!
//! The engine is the "imperative shell" of a machine: it owns one handler per
//! identifier, tracks the current and previous identifiers and runs the
//! current handler once per tick. The same engine drives the top-level
//! protocol machine and the nested handshake machine.
//!
//! # Key Concepts
//!
//! - **Handlers**: per-state behavior behind the `StateHandler` trait
//! - **Transitions**: an interrupt-safe handle; requests overwrite each other
//!   until the next tick observes the last one
//! - **Tick**: commit a pending transition, deliver its task once, handle the
//!   current state once

mod handler;
mod machine;
mod transition;

pub use handler::{BoxedState, StateHandler};
pub use machine::StateMachine;
pub use transition::Transitions;
