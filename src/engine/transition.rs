//! Interrupt-safe transition requests.

use crate::core::StateId;
use critical_section::Mutex;
use std::cell::Cell;
use std::sync::Arc;

/// Requested target plus the task that travels with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Pending<S, T> {
    pub(crate) target: S,
    pub(crate) task: Option<T>,
}

/// Handle for requesting transitions on a [`StateMachine`](super::StateMachine).
///
/// Handles are cheap to clone and `Send + Sync`, so one can be moved into
/// an interrupt callback. A request only writes two small fields inside a
/// critical section: it never touches the state table, never allocates and
/// never blocks. Requests issued before the engine's next `tick` overwrite
/// each other; the last one wins.
pub struct Transitions<S: StateId, T: Copy + Send + 'static> {
    pending: Arc<Mutex<Cell<Pending<S, T>>>>,
}

impl<S: StateId, T: Copy + Send + 'static> Clone for Transitions<S, T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<S: StateId, T: Copy + Send + 'static> Transitions<S, T> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Cell::new(Pending {
                target: initial,
                task: None,
            }))),
        }
    }

    /// Request a transition to `target` with no task.
    ///
    /// Any task attached to an earlier, not yet observed request is dropped.
    pub fn request(&self, target: S) {
        self.store(Pending { target, task: None });
    }

    /// Request a transition to `target`, delivering `task` to the target
    /// state when the transition is observed.
    pub fn request_with_task(&self, target: S, task: T) {
        self.store(Pending {
            target,
            task: Some(task),
        });
    }

    /// The most recently requested identifier.
    pub fn current(&self) -> S {
        critical_section::with(|cs| self.pending.borrow(cs).get().target)
    }

    /// Observe a pending transition away from `previous`.
    ///
    /// When the requested target differs from `previous`, the task is moved
    /// out of the slot so it can only be delivered once.
    pub(crate) fn observe(&self, previous: S) -> Option<Pending<S, T>> {
        critical_section::with(|cs| {
            let slot = self.pending.borrow(cs);
            let pending = slot.get();
            if pending.target == previous {
                return None;
            }
            slot.set(Pending {
                target: pending.target,
                task: None,
            });
            Some(pending)
        })
    }

    fn store(&self, pending: Pending<S, T>) {
        critical_section::with(|cs| self.pending.borrow(cs).set(pending));
    }
}
