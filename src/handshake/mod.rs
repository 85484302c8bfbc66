//! The two-device synchronization handshake.
//!
//! The handshake runs as a nested machine inside the top-level `Sync` state.
//! One device takes the Initiator role and one the Receiver role:
//!
//! ```text
//! Initiator                              Receiver
//! SendInitialPulse   -- wake-up ----->   WaitForInitialPulse
//! SendPreamble       -- N pulses ---->   MeasurePreamble
//! WaitForConfirmation <- confirmation -- SendConfirmation
//! SendFinalTrigger   -- trigger ----->   WaitForFinalTrigger
//! Synced                                 Synced
//! ```
//!
//! Both sides then fire their synchronized action a fixed number of half
//! periods after the trigger's rising edge and park in `Idle`. Failures go
//! through `Timeout`, except a Receiver that hears no Initiator at all,
//! which returns straight to `Idle`.

mod initiator;
mod receiver;
mod terminal;

pub use initiator::{SendFinalTrigger, SendInitialPulse, SendPreamble, WaitForConfirmation};
pub use receiver::{
    estimate_half_period, has_majority, MeasurePreamble, SendConfirmation, WaitForFinalTrigger,
    WaitForInitialPulse,
};
pub use terminal::{Parked, Synced, Timeout};

use crate::builder::{BuildError, StateMachineBuilder};
use crate::config::SyncConfig;
use crate::context::DeviceContext;
use crate::engine::{StateMachine, Transitions};
use crate::hal::Hardware;
use crate::state_enum;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

state_enum! {
    /// Identifiers of the nested handshake machine.
    pub enum SyncStep {
        Idle,
        Synced,
        Timeout,
        Request,
        Initiate,

        InitiateSendInitialPulse,
        InitiateSendPreamble,
        InitiateWaitForConfirmation,
        InitiateSendFinalTrigger,

        RequestWaitForInitialPulse,
        RequestMeasurePreamble,
        RequestSendConfirmation,
        RequestWaitForFinalTrigger,
    }
    final: [Synced, Timeout]
    error: [Timeout]
}

/// Which side of the handshake a device plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Send the wake-up pulse, preamble and final trigger
    Initiate,
    /// Measure the Initiator's pulses and confirm
    Request,
}

impl Role {
    /// First step of the nested machine for this role.
    pub fn entry_step(self) -> SyncStep {
        match self {
            Role::Initiate => SyncStep::InitiateSendInitialPulse,
            Role::Request => SyncStep::RequestWaitForInitialPulse,
        }
    }
}

/// Pulse a failure refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    WakeUp,
    Preamble,
    Confirmation,
    FinalTrigger,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::WakeUp => "wake-up",
            Phase::Preamble => "preamble",
            Phase::Confirmation => "confirmation",
            Phase::FinalTrigger => "final trigger",
        })
    }
}

/// Why a handshake attempt ended in `Timeout`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SyncFailure {
    #[error("{phase} pulse of {measured_us}us outside [{min_us}, {max_us}]")]
    TimingViolation {
        phase: Phase,
        measured_us: u32,
        min_us: u32,
        max_us: u32,
    },

    #[error("no {phase} pulse within {timeout_us}us")]
    MissingPulse { phase: Phase, timeout_us: u32 },

    #[error("only {measured} of {expected} preamble pulses measured")]
    InsufficientPreamble { measured: u32, expected: u32 },

    #[error("final trigger not seen within {timeout_us}us")]
    TriggerTimeout { timeout_us: u32 },
}

/// How the last handshake attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced { pulse_width_us: u32 },
    /// Receiver heard no valid wake-up pulse
    NoInitiator,
    Failed { failure: Option<SyncFailure> },
}

/// The nested machine hosted by the `Sync` state.
pub type HandshakeMachine<H> = StateMachine<SyncStep, (), DeviceContext<H>>;

/// Build the nested handshake machine, allocating every timer its steps own.
pub fn handshake_machine<H: Hardware>(
    hw: &mut H,
    config: &SyncConfig,
) -> Result<HandshakeMachine<H>, BuildError> {
    StateMachineBuilder::<SyncStep, (), DeviceContext<H>>::new()
        .initial(SyncStep::Idle)
        .state(Box::new(Parked))
        .state(Box::new(SendInitialPulse::new(hw)))
        .state(Box::new(SendPreamble::new(hw)))
        .state(Box::new(WaitForConfirmation))
        .state(Box::new(SendFinalTrigger::new(hw)))
        .state(Box::new(WaitForInitialPulse))
        .state(Box::new(MeasurePreamble))
        .state(Box::new(SendConfirmation::new(hw)))
        .state(Box::new(WaitForFinalTrigger::new(hw)))
        .state(Box::new(Synced::new(hw, config)))
        .state(Box::new(Timeout))
        .build()
}

/// Record `failure` for the current attempt and head for `Timeout`.
pub(crate) fn fail<H: Hardware>(
    ctx: &mut DeviceContext<H>,
    role: Role,
    transitions: &Transitions<SyncStep, ()>,
    failure: SyncFailure,
) {
    debug!(%failure, "handshake step failed");
    ctx.attempt_mut(role).failure = Some(failure);
    transitions.request(SyncStep::Timeout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateId;

    #[test]
    fn roles_enter_their_first_step() {
        assert_eq!(
            Role::Initiate.entry_step(),
            SyncStep::InitiateSendInitialPulse
        );
        assert_eq!(
            Role::Request.entry_step(),
            SyncStep::RequestWaitForInitialPulse
        );
    }

    #[test]
    fn timeout_is_the_only_error_step() {
        assert!(SyncStep::Timeout.is_error());
        assert!(SyncStep::Synced.is_final());
        assert!(!SyncStep::Synced.is_error());
        assert!(!SyncStep::RequestMeasurePreamble.is_final());
    }

    #[test]
    fn failures_describe_themselves() {
        let failure = SyncFailure::TimingViolation {
            phase: Phase::Confirmation,
            measured_us: 26_000,
            min_us: 20_000,
            max_us: 25_000,
        };
        assert_eq!(
            failure.to_string(),
            "confirmation pulse of 26000us outside [20000, 25000]"
        );
    }

    #[test]
    fn outcome_serializes_with_a_tag() {
        let json = serde_json::to_value(SyncOutcome::Synced {
            pulse_width_us: 500,
        })
        .unwrap();
        assert_eq!(json["outcome"], "synced");
        assert_eq!(json["pulse_width_us"], 500);

        let failed = SyncOutcome::Failed {
            failure: Some(SyncFailure::TriggerTimeout { timeout_us: 50_000 }),
        };
        let back: SyncOutcome =
            serde_json::from_str(&serde_json::to_string(&failed).unwrap()).unwrap();
        assert_eq!(back, failed);
    }
}
