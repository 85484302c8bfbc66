//! Receiver side: wake-up detection, preamble measurement, confirmation and
//! final trigger.

use super::{fail, Phase, Role, SyncFailure, SyncOutcome, SyncStep};
use crate::context::DeviceContext;
use crate::engine::{StateHandler, Transitions};
use crate::hal::{Hardware, Level, OneShotTimer, OutputPin};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Half period estimated from `measured` (high, low) pairs lasting
/// `total_us` altogether.
///
/// # Example
///
/// ```rust
/// use pulsesync::handshake::estimate_half_period;
///
/// assert_eq!(estimate_half_period(19_000, 19), Some(500));
/// assert_eq!(estimate_half_period(0, 0), None);
/// ```
pub fn estimate_half_period(total_us: u64, measured: u32) -> Option<u32> {
    if measured == 0 {
        return None;
    }
    u32::try_from(total_us / u64::from(measured) / 2).ok()
}

/// Whether `measured` is a strict majority of `expected`.
pub fn has_majority(measured: u32, expected: u32) -> bool {
    u64::from(measured) * 2 > u64::from(expected)
}

/// Listen, bounded, for the Initiator's wake-up pulse.
///
/// Hearing nothing usable is the normal quiet condition: the attempt ends
/// in `Idle` with [`SyncOutcome::NoInitiator`] instead of going through
/// `Timeout`.
pub struct WaitForInitialPulse;

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for WaitForInitialPulse {
    fn id(&self) -> SyncStep {
        SyncStep::RequestWaitForInitialPulse
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let window = ctx.config.initial_window;

        match ctx.hw.pulse_in(Level::High, ctx.config.initial_timeout_us) {
            Some(measured_us) if window.contains(measured_us) => {
                debug!(measured_us, "wake-up pulse received");
                transitions.request(SyncStep::RequestMeasurePreamble);
            }
            measured_us => {
                debug!(?measured_us, "no initiator");
                ctx.outcome = Some(SyncOutcome::NoInitiator);
                transitions.request(SyncStep::Idle);
            }
        }
    }
}

/// Measure the preamble and derive the discovered pulse width.
pub struct MeasurePreamble;

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for MeasurePreamble {
    fn id(&self) -> SyncStep {
        SyncStep::RequestMeasurePreamble
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let expected = ctx.config.preamble_pulses;
        let timeout_us = ctx.config.preamble_timeout_us;

        let mut total_us = 0u64;
        let mut measured = 0u32;
        for _ in 0..expected {
            let Some(high_us) = ctx.hw.pulse_in(Level::High, timeout_us) else {
                continue;
            };
            let Some(low_us) = ctx.hw.pulse_in(Level::Low, timeout_us) else {
                continue;
            };
            total_us += u64::from(high_us) + u64::from(low_us);
            measured += 1;
        }
        debug!(measured, expected, total_us, "preamble measured");

        let width = if has_majority(measured, expected) {
            estimate_half_period(total_us, measured)
        } else {
            None
        };
        match width {
            Some(width_us) => {
                ctx.attempt_mut(Role::Request).pulse_width_us = Some(width_us);
                debug!(width_us, "pulse width discovered");
                transitions.request(SyncStep::RequestSendConfirmation);
            }
            None => fail(
                ctx,
                Role::Request,
                transitions,
                SyncFailure::InsufficientPreamble { measured, expected },
            ),
        }
    }
}

/// Drive the long confirmation pulse.
pub struct SendConfirmation<H: Hardware> {
    tx: H::Pin,
}

impl<H: Hardware> SendConfirmation<H> {
    pub fn new(hw: &mut H) -> Self {
        Self { tx: hw.tx_pin() }
    }
}

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for SendConfirmation<H> {
    fn id(&self) -> SyncStep {
        SyncStep::RequestSendConfirmation
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let width_us = ctx.config.confirmation_pulse_us;
        self.tx.pulse(width_us);
        debug!(width_us, "confirmation sent");
        transitions.request(SyncStep::RequestWaitForFinalTrigger);
    }
}

/// Poll for the final trigger once per tick, bounded by a one-shot timer.
pub struct WaitForFinalTrigger<H: Hardware> {
    timer: H::Timer,
    expired: Arc<AtomicBool>,
    started: bool,
}

impl<H: Hardware> WaitForFinalTrigger<H> {
    pub fn new(hw: &mut H) -> Self {
        let expired = Arc::new(AtomicBool::new(false));
        let timer = {
            let expired = Arc::clone(&expired);
            hw.one_shot(Box::new(move || expired.store(true, Ordering::Release)))
        };
        Self {
            timer,
            expired,
            started: false,
        }
    }
}

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for WaitForFinalTrigger<H> {
    fn id(&self) -> SyncStep {
        SyncStep::RequestWaitForFinalTrigger
    }

    fn enter(&mut self, _task: Option<()>, _ctx: &mut DeviceContext<H>) {
        self.started = false;
        self.expired.store(false, Ordering::Release);
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let timeout_us = ctx.config.trigger_timeout_us;
        if !self.started {
            self.started = true;
            self.timer.start(timeout_us);
        }

        if ctx.hw.read().is_high() {
            self.timer.stop();
            ctx.attempt_mut(Role::Request).trigger_at_us = Some(ctx.hw.now_us());
            debug!("final trigger received");
            transitions.request(SyncStep::Synced);
        } else if self.expired.swap(false, Ordering::AcqRel) {
            fail(
                ctx,
                Role::Request,
                transitions,
                SyncFailure::TriggerTimeout { timeout_us },
            );
        }
    }
}
