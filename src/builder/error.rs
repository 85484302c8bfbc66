//! Build errors for state machine construction.

use thiserror::Error;

/// Errors that can occur when building state machines.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("No states registered. Add at least one state")]
    NoStates,

    #[error("State '{state}' registered more than once")]
    DuplicateState { state: String },
}
