//! Tick-driven state machine engine.

use super::handler::BoxedState;
use super::transition::Transitions;
use crate::core::{StateHistory, StateId, StateTransition};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{trace, warn};

/// State machine that dispatches to a fixed table of state handlers.
///
/// The table is wired once at construction (see
/// [`StateMachineBuilder`](crate::builder::StateMachineBuilder)) and never
/// changes afterwards. Transitions are requested through [`Transitions`]
/// and take effect on the next [`tick`](Self::tick).
pub struct StateMachine<S: StateId, T: Copy + Send + 'static, Ctx> {
    states: HashMap<S, BoxedState<S, T, Ctx>>,
    transitions: Transitions<S, T>,
    previous: S,
    active: Option<S>,
    history: StateHistory<S>,
}

impl<S: StateId, T: Copy + Send + 'static, Ctx> StateMachine<S, T, Ctx> {
    pub(crate) fn new(
        initial: S,
        states: HashMap<S, BoxedState<S, T, Ctx>>,
        history: StateHistory<S>,
    ) -> Self {
        let active = states.contains_key(&initial).then_some(initial);
        if active.is_none() {
            warn!(state = initial.name(), "initial state has no registered handler");
        }
        Self {
            states,
            transitions: Transitions::new(initial),
            previous: initial,
            active,
            history,
        }
    }

    /// Handle for requesting transitions, including from interrupt context.
    pub fn transitions(&self) -> &Transitions<S, T> {
        &self.transitions
    }

    /// Request a transition to `target`.
    pub fn request(&self, target: S) {
        self.transitions.request(target);
    }

    /// Request a transition to `target` carrying `task`.
    pub fn request_with_task(&self, target: S, task: T) {
        self.transitions.request_with_task(target, task);
    }

    /// The most recently requested identifier (the machine's current id).
    pub fn current(&self) -> S {
        self.transitions.current()
    }

    /// The identifier the engine last observed and dispatched to.
    pub fn previous(&self) -> S {
        self.previous
    }

    /// The state being dispatched to, or `None` when the last observed
    /// identifier has no registered handler.
    pub fn active(&self) -> Option<S> {
        self.active
    }

    pub fn is_registered(&self, id: S) -> bool {
        self.states.contains_key(&id)
    }

    /// Observed transitions (pure)
    pub fn history(&self) -> &StateHistory<S> {
        &self.history
    }

    /// Run one iteration of the machine.
    ///
    /// If a transition is pending it is committed first: the previous id is
    /// updated, the new state is resolved and any pending task is delivered
    /// through [`StateHandler::enter`](super::StateHandler::enter). Then the
    /// resolved state, if any, is handled exactly once.
    ///
    /// An identifier without a registered handler suspends dispatch until
    /// the next transition. This is logged, never fatal.
    pub fn tick(&mut self, ctx: &mut Ctx) {
        if let Some(pending) = self.transitions.observe(self.previous) {
            let from = self.previous;
            let to = pending.target;
            trace!(
                from = from.name(),
                to = to.name(),
                task = pending.task.is_some(),
                "state transition"
            );
            self.history.record(StateTransition {
                from,
                to,
                timestamp: Utc::now(),
                task_delivered: pending.task.is_some(),
            });
            self.previous = to;

            match self.states.get_mut(&to) {
                Some(state) => {
                    self.active = Some(to);
                    state.enter(pending.task, ctx);
                }
                None => {
                    self.active = None;
                    warn!(
                        state = to.name(),
                        dropped_task = pending.task.is_some(),
                        "no state registered; dispatch suspended"
                    );
                }
            }
        }

        if let Some(state) = self.active.and_then(|id| self.states.get_mut(&id)) {
            state.handle(ctx, &self.transitions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateMachineBuilder;
    use crate::engine::StateHandler;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum Light {
        Off,
        Blinking,
        On,
        Broken,
    }

    impl StateId for Light {
        fn name(&self) -> &'static str {
            match self {
                Self::Off => "Off",
                Self::Blinking => "Blinking",
                Self::On => "On",
                Self::Broken => "Broken",
            }
        }
    }

    #[derive(Default)]
    struct Log {
        entered: Vec<(Light, Option<u32>)>,
        handled: Vec<Light>,
    }

    struct Recorder {
        id: Light,
        next: Option<Light>,
    }

    impl StateHandler<Light, u32, Log> for Recorder {
        fn id(&self) -> Light {
            self.id
        }

        fn enter(&mut self, task: Option<u32>, log: &mut Log) {
            log.entered.push((self.id, task));
        }

        fn handle(&mut self, log: &mut Log, transitions: &Transitions<Light, u32>) {
            log.handled.push(self.id);
            if let Some(next) = self.next {
                transitions.request(next);
            }
        }
    }

    fn machine() -> StateMachine<Light, u32, Log> {
        StateMachineBuilder::new()
            .initial(Light::Off)
            .state(Box::new(Recorder {
                id: Light::Off,
                next: None,
            }))
            .state(Box::new(Recorder {
                id: Light::Blinking,
                next: Some(Light::On),
            }))
            .state(Box::new(Recorder {
                id: Light::On,
                next: None,
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn initial_state_is_handled_without_enter() {
        let mut machine = machine();
        let mut log = Log::default();

        machine.tick(&mut log);

        assert!(log.entered.is_empty());
        assert_eq!(log.handled, vec![Light::Off]);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn transition_delivers_task_then_handles() {
        let mut machine = machine();
        let mut log = Log::default();

        machine.request_with_task(Light::On, 42);
        machine.tick(&mut log);

        assert_eq!(log.entered, vec![(Light::On, Some(42))]);
        assert_eq!(log.handled, vec![Light::On]);
        assert_eq!(machine.previous(), Light::On);
        assert!(machine.history().last().unwrap().task_delivered);
    }

    #[test]
    fn state_requested_transition_runs_on_next_tick() {
        let mut machine = machine();
        let mut log = Log::default();

        machine.request(Light::Blinking);
        machine.tick(&mut log);
        assert_eq!(machine.current(), Light::On);
        assert_eq!(machine.previous(), Light::Blinking);

        machine.tick(&mut log);
        assert_eq!(log.handled, vec![Light::Blinking, Light::On]);
        assert_eq!(
            machine.history().get_path(),
            vec![Light::Off, Light::Blinking, Light::On]
        );
    }

    #[test]
    fn repeated_ticks_do_not_redeliver() {
        let mut machine = machine();
        let mut log = Log::default();

        machine.request_with_task(Light::On, 1);
        for _ in 0..5 {
            machine.tick(&mut log);
        }

        assert_eq!(log.entered.len(), 1);
        assert_eq!(log.handled.len(), 5);
        assert_eq!(machine.history().len(), 1);
    }

    #[test]
    fn unregistered_state_suspends_dispatch() {
        let mut machine = machine();
        let mut log = Log::default();

        machine.request_with_task(Light::Broken, 9);
        machine.tick(&mut log);
        machine.tick(&mut log);

        assert_eq!(machine.active(), None);
        assert_eq!(machine.previous(), Light::Broken);
        assert!(log.entered.is_empty());
        assert!(log.handled.is_empty());

        machine.request(Light::Off);
        machine.tick(&mut log);
        assert_eq!(machine.active(), Some(Light::Off));
        assert_eq!(log.entered, vec![(Light::Off, None)]);
    }

    #[test]
    fn unregistered_initial_state_is_a_no_op() {
        let mut machine: StateMachine<Light, u32, Log> = StateMachineBuilder::new()
            .initial(Light::Broken)
            .state(Box::new(Recorder {
                id: Light::Off,
                next: None,
            }))
            .build()
            .unwrap();
        let mut log = Log::default();

        machine.tick(&mut log);
        assert!(log.handled.is_empty());
        assert!(!machine.is_registered(Light::Broken));
    }
}
