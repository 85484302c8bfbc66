//! Context passed to every state of both machines.

use crate::config::SyncConfig;
use crate::edge::{EdgeDetector, EdgeError};
use crate::hal::Hardware;
use crate::handshake::{Role, SyncFailure, SyncOutcome};
use uuid::Uuid;

/// Scratch values of one handshake attempt, reset when an attempt starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Attempt {
    /// Correlates the log lines of one attempt
    pub id: Uuid,
    pub role: Role,
    /// Half period learned from the preamble (or, for the Initiator, the
    /// half period it sent)
    pub pulse_width_us: Option<u32>,
    /// Clock reading when the final trigger went high: raised by the
    /// Initiator, first seen by the Receiver
    pub trigger_at_us: Option<u64>,
    /// Why the attempt is heading for `Timeout`
    pub failure: Option<SyncFailure>,
}

impl Attempt {
    pub fn new(role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            pulse_width_us: None,
            trigger_at_us: None,
            failure: None,
        }
    }
}

/// Hardware, configuration and shared values of one device.
///
/// The parent machine and the nested handshake machine both tick with the
/// same context. Fields are only touched from the main loop; values shared
/// with interrupts live in the edge table or in state-owned atomics.
pub struct DeviceContext<H: Hardware> {
    pub hw: H,
    pub config: SyncConfig,
    pub edge: EdgeDetector,
    /// Role queued by the application, consumed by the Idle state
    pub pending_role: Option<Role>,
    pub edges_observed: u32,
    pub attempt: Option<Attempt>,
    pub outcome: Option<SyncOutcome>,
}

impl<H: Hardware> DeviceContext<H> {
    /// Build a context. The edge detector is created but not armed.
    pub fn new(hw: H, config: SyncConfig) -> Result<Self, EdgeError> {
        let edge = EdgeDetector::new(config.sync_pin)?;
        Ok(Self {
            hw,
            config,
            edge,
            pending_role: None,
            edges_observed: 0,
            attempt: None,
            outcome: None,
        })
    }

    /// Start a fresh attempt and return its id.
    pub fn begin_attempt(&mut self, role: Role) -> Uuid {
        let attempt = Attempt::new(role);
        let id = attempt.id;
        self.attempt = Some(attempt);
        self.outcome = None;
        id
    }

    pub(crate) fn attempt_mut(&mut self, role: Role) -> &mut Attempt {
        self.attempt.get_or_insert_with(|| Attempt::new(role))
    }
}
