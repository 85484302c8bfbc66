//! Builder API for state machine construction.
//!
//! A machine's state table is assembled here exactly once; the engine never
//! adds or removes states afterwards.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use machine::StateMachineBuilder;
