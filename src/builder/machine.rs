//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::core::{StateHistory, StateId, DEFAULT_HISTORY_CAPACITY};
use crate::engine::{BoxedState, StateMachine};
use std::collections::HashMap;

/// Builder for constructing state machines with a fluent API.
///
/// All wiring happens here; a built machine's state table is fixed.
pub struct StateMachineBuilder<S: StateId, T: Copy + Send + 'static, Ctx> {
    initial: Option<S>,
    states: Vec<BoxedState<S, T, Ctx>>,
    history_capacity: usize,
}

impl<S: StateId, T: Copy + Send + 'static, Ctx> StateMachineBuilder<S, T, Ctx> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            states: Vec::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Register a state handler under the identifier it reports.
    pub fn state(mut self, state: BoxedState<S, T, Ctx>) -> Self {
        self.states.push(state);
        self
    }

    /// Register several state handlers at once.
    pub fn states(mut self, states: Vec<BoxedState<S, T, Ctx>>) -> Self {
        self.states.extend(states);
        self
    }

    /// Number of transitions the machine's history retains.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Build the state machine.
    /// Returns an error if required fields are missing or an identifier is
    /// registered twice.
    pub fn build(self) -> Result<StateMachine<S, T, Ctx>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        if self.states.is_empty() {
            return Err(BuildError::NoStates);
        }

        let mut table = HashMap::with_capacity(self.states.len());
        for state in self.states {
            let id = state.id();
            if table.insert(id, state).is_some() {
                return Err(BuildError::DuplicateState {
                    state: id.name().to_string(),
                });
            }
        }

        Ok(StateMachine::new(
            initial,
            table,
            StateHistory::with_capacity(self.history_capacity),
        ))
    }
}

impl<S: StateId, T: Copy + Send + 'static, Ctx> Default for StateMachineBuilder<S, T, Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
