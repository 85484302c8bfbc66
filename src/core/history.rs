//! State transition history tracking.
//!
//! Engines record every observed transition into a bounded ring so the
//! recent path of a machine can be inspected or serialized for diagnostics
//! without growing without bound on a long-running device.

use super::state::StateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of transitions an engine keeps.
pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// Record of a single observed state transition.
///
/// # Example
///
/// ```rust
/// use pulsesync::core::{StateId, StateTransition};
/// use serde::{Deserialize, Serialize};
/// use chrono::Utc;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Phase {
///     Waiting,
///     Running,
/// }
///
/// impl StateId for Phase {
///     fn name(&self) -> &'static str {
///         match self {
///             Self::Waiting => "Waiting",
///             Self::Running => "Running",
///         }
///     }
/// }
///
/// let transition = StateTransition {
///     from: Phase::Waiting,
///     to: Phase::Running,
///     timestamp: Utc::now(),
///     task_delivered: true,
/// };
/// assert!(transition.task_delivered);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: StateId> {
    /// The identifier being transitioned from
    pub from: S,
    /// The identifier being transitioned to
    pub to: S,
    /// When the engine observed the transition
    pub timestamp: DateTime<Utc>,
    /// Whether a task payload accompanied the transition
    pub task_delivered: bool,
}

/// Bounded, ordered history of observed transitions.
///
/// Once `capacity` transitions are held, recording a new one evicts the
/// oldest.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: StateId> {
    transitions: VecDeque<StateTransition<S>>,
    capacity: usize,
}

impl<S: StateId> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateId> StateHistory<S> {
    /// Create an empty history holding up to [`DEFAULT_HISTORY_CAPACITY`]
    /// transitions.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create an empty history holding up to `capacity` transitions.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            transitions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a transition, evicting the oldest one when full.
    pub fn record(&mut self, transition: StateTransition<S>) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Get the path of identifiers traversed.
    ///
    /// Returns the `from` of the oldest retained transition followed by the
    /// `to` of each transition, in order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pulsesync::core::{StateHistory, StateId, StateTransition};
    /// use serde::{Deserialize, Serialize};
    /// use chrono::Utc;
    ///
    /// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    /// enum Step { One, Two, Three }
    ///
    /// impl StateId for Step {
    ///     fn name(&self) -> &'static str {
    ///         match self {
    ///             Self::One => "One",
    ///             Self::Two => "Two",
    ///             Self::Three => "Three",
    ///         }
    ///     }
    /// }
    ///
    /// let mut history = StateHistory::new();
    /// history.record(StateTransition {
    ///     from: Step::One,
    ///     to: Step::Two,
    ///     timestamp: Utc::now(),
    ///     task_delivered: false,
    /// });
    /// history.record(StateTransition {
    ///     from: Step::Two,
    ///     to: Step::Three,
    ///     timestamp: Utc::now(),
    ///     task_delivered: false,
    /// });
    ///
    /// assert_eq!(history.get_path(), vec![Step::One, Step::Two, Step::Three]);
    /// ```
    pub fn get_path(&self) -> Vec<S> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.front() {
            path.push(first.from);
        }
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }

    /// Duration between the oldest and newest retained transitions.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.front()?, self.transitions.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Most recent transition, if any.
    pub fn last(&self) -> Option<&StateTransition<S>> {
        self.transitions.back()
    }

    /// Iterate retained transitions, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition<S>> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
