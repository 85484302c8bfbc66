//! Identifier contract for state machine states.
//!
//! Every machine is keyed by a closed enumeration of identifiers. The engine
//! compares, hashes and copies them freely, including inside critical
//! sections, so identifiers must be small `Copy` values.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for state identifiers.
///
/// All methods are pure - no side effects. An identifier names a state; the
/// behavior lives in the [`StateHandler`](crate::engine::StateHandler)
/// registered for it.
///
/// # Required Traits
///
/// - `Copy`: identifiers are written from interrupt context as plain scalars
/// - `Eq` + `Hash`: the engine indexes its state table by identifier
/// - `Debug`: identifiers are debuggable for diagnostics
/// - `Serialize` + `Deserialize`: histories and reports are serializable
///
/// # Example
///
/// ```rust
/// use pulsesync::core::StateId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Link {
///     Down,
///     Training,
///     Up,
///     Faulted,
/// }
///
/// impl StateId for Link {
///     fn name(&self) -> &'static str {
///         match self {
///             Self::Down => "Down",
///             Self::Training => "Training",
///             Self::Up => "Up",
///             Self::Faulted => "Faulted",
///         }
///     }
///
///     fn is_final(&self) -> bool {
///         matches!(self, Self::Up | Self::Faulted)
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Faulted)
///     }
/// }
///
/// assert_eq!(Link::Training.name(), "Training");
/// assert!(Link::Faulted.is_error());
/// ```
pub trait StateId:
    Copy + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Get the identifier's name for display/logging.
    fn name(&self) -> &'static str;

    /// Check if this identifier names a terminal step of its protocol.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this identifier names a failure step.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashSet;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Measuring,
        Locked,
        Lost,
    }

    impl StateId for TestState {
        fn name(&self) -> &'static str {
            match self {
                Self::Idle => "Idle",
                Self::Measuring => "Measuring",
                Self::Locked => "Locked",
                Self::Lost => "Lost",
            }
        }

        fn is_final(&self) -> bool {
            matches!(self, Self::Locked | Self::Lost)
        }

        fn is_error(&self) -> bool {
            matches!(self, Self::Lost)
        }
    }

    #[test]
    fn state_name_returns_correct_value() {
        assert_eq!(TestState::Idle.name(), "Idle");
        assert_eq!(TestState::Measuring.name(), "Measuring");
        assert_eq!(TestState::Locked.name(), "Locked");
        assert_eq!(TestState::Lost.name(), "Lost");
    }

    #[test]
    fn is_final_identifies_terminal_states() {
        assert!(!TestState::Idle.is_final());
        assert!(!TestState::Measuring.is_final());
        assert!(TestState::Locked.is_final());
        assert!(TestState::Lost.is_final());
    }

    #[test]
    fn is_error_identifies_error_states() {
        assert!(!TestState::Idle.is_error());
        assert!(!TestState::Locked.is_error());
        assert!(TestState::Lost.is_error());
    }

    #[test]
    fn identifiers_are_hashable_keys() {
        let keys: HashSet<TestState> = [TestState::Idle, TestState::Lost, TestState::Idle]
            .into_iter()
            .collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&TestState::Lost));
    }

    #[test]
    fn state_serializes_correctly() {
        let state = TestState::Measuring;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: TestState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
