//! State behavior contract.

use super::transition::Transitions;
use crate::core::StateId;

/// Behavior registered for one identifier of a machine.
///
/// A handler is created once, handed to the engine at construction and owned
/// by it for the engine's whole lifetime. Instead of holding a pointer back
/// to its machine, a handler receives a [`Transitions`] handle on every call
/// and uses it to request the next state.
///
/// `Ctx` is whatever the machine's owner passes to
/// [`StateMachine::tick`](super::StateMachine::tick): hardware access,
/// configuration and values shared between states.
pub trait StateHandler<S: StateId, T: Copy + Send + 'static, Ctx> {
    /// The identifier this handler is registered under.
    fn id(&self) -> S;

    /// Called exactly once each time the engine observes a transition into
    /// this state, before the first `handle` of that visit.
    ///
    /// `task` is the payload of the request that caused the transition, if
    /// any. Handlers reset per-visit fields here.
    fn enter(&mut self, task: Option<T>, ctx: &mut Ctx) {
        let _ = (task, ctx);
    }

    /// Per-tick work while this state is current.
    fn handle(&mut self, ctx: &mut Ctx, transitions: &Transitions<S, T>);
}

/// Owned, type-erased handler as stored in the engine's table.
pub type BoxedState<S, T, Ctx> = Box<dyn StateHandler<S, T, Ctx>>;
