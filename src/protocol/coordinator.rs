use super::MasterState;
use crate::context::DeviceContext;
use crate::engine::{StateHandler, Transitions};
use crate::hal::Hardware;
use crate::handshake::{HandshakeMachine, Role, SyncStep};
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// The top-level `Sync` state: hosts the nested handshake machine.
///
/// The role task arms the nested machine and detaches the edge interrupt.
/// Every later tick drives the nested machine; once it is back in its
/// `Idle` step the interrupt is re-armed and the parent returns to `Idle`.
pub struct SyncCoordinator<H: Hardware> {
    nested: HandshakeMachine<H>,
    task: Option<Role>,
    attempt: Option<(Uuid, Role)>,
}

impl<H: Hardware> SyncCoordinator<H> {
    pub fn new(nested: HandshakeMachine<H>) -> Self {
        Self {
            nested,
            task: None,
            attempt: None,
        }
    }

    pub fn nested(&self) -> &HandshakeMachine<H> {
        &self.nested
    }

    /// Whether a handshake is running.
    pub fn is_active(&self) -> bool {
        self.attempt.is_some()
    }
}

impl<H: Hardware> StateHandler<MasterState, Role, DeviceContext<H>> for SyncCoordinator<H> {
    fn id(&self) -> MasterState {
        MasterState::Sync
    }

    fn enter(&mut self, task: Option<Role>, _ctx: &mut DeviceContext<H>) {
        if task.is_none() {
            warn!("Sync entered without a role");
        }
        self.task = task;
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<MasterState, Role>) {
        if let Some(role) = self.task.take() {
            // The handshake polls the line itself from here on.
            ctx.edge.disarm(&mut ctx.hw);
            let id = ctx.begin_attempt(role);
            self.nested.request(role.entry_step());
            self.attempt = Some((id, role));
            info!(attempt = %id, ?role, "handshake armed");
            return;
        }

        let Some((id, role)) = self.attempt else {
            warn!("no handshake in progress; returning to Idle");
            transitions.request(MasterState::Idle);
            return;
        };

        let span = info_span!("handshake", attempt = %id, role = ?role);
        let _entered = span.enter();

        self.nested.tick(ctx);
        if self.nested.current() == SyncStep::Idle {
            // Settle the nested machine on Idle before handing back.
            self.nested.tick(ctx);
            self.attempt = None;
            ctx.edge.arm(&mut ctx.hw);
            info!(outcome = ?ctx.outcome, "handshake finished");
            transitions.request(MasterState::Idle);
        }
    }
}
