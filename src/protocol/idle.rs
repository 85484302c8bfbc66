use super::MasterState;
use crate::context::DeviceContext;
use crate::engine::{StateHandler, Transitions};
use crate::hal::Hardware;
use crate::handshake::Role;
use tracing::{debug, info};

/// Top-level resting state.
///
/// Consumes the sticky edge flag and starts a handshake when the
/// application has queued a role.
pub struct IdleState;

impl<H: Hardware> StateHandler<MasterState, Role, DeviceContext<H>> for IdleState {
    fn id(&self) -> MasterState {
        MasterState::Idle
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<MasterState, Role>) {
        if ctx.edge.test_and_clear() {
            ctx.edges_observed = ctx.edges_observed.wrapping_add(1);
            debug!(
                pin = ctx.edge.pin(),
                count = ctx.edges_observed,
                "sync edge observed"
            );
        }

        if let Some(role) = ctx.pending_role.take() {
            info!(?role, "starting handshake");
            transitions.request_with_task(MasterState::Sync, role);
        }
    }
}
