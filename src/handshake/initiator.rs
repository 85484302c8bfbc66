//! Initiator side: wake-up pulse, preamble, confirmation, final trigger.

use super::{fail, Phase, Role, SyncFailure, SyncStep};
use crate::context::DeviceContext;
use crate::engine::{StateHandler, Transitions};
use crate::hal::{Hardware, Level, OneShotTimer, OutputPin};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Drive the long wake-up pulse.
pub struct SendInitialPulse<H: Hardware> {
    tx: H::Pin,
}

impl<H: Hardware> SendInitialPulse<H> {
    pub fn new(hw: &mut H) -> Self {
        Self { tx: hw.tx_pin() }
    }
}

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for SendInitialPulse<H> {
    fn id(&self) -> SyncStep {
        SyncStep::InitiateSendInitialPulse
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let width_us = ctx.config.initial_pulse_us;
        self.tx.pulse(width_us);
        debug!(width_us, "wake-up pulse sent");
        transitions.request(SyncStep::InitiateSendPreamble);
    }
}

/// Emit the clock-discovery preamble at the configured half period.
pub struct SendPreamble<H: Hardware> {
    tx: H::Pin,
}

impl<H: Hardware> SendPreamble<H> {
    pub fn new(hw: &mut H) -> Self {
        Self { tx: hw.tx_pin() }
    }
}

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for SendPreamble<H> {
    fn id(&self) -> SyncStep {
        SyncStep::InitiateSendPreamble
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let half_period_us = ctx.config.preamble_half_period_us;
        let pulses = ctx.config.preamble_pulses;
        for _ in 0..pulses {
            self.tx.pulse(half_period_us);
            ctx.hw.delay_us(half_period_us);
        }
        ctx.attempt_mut(Role::Initiate).pulse_width_us = Some(half_period_us);
        debug!(pulses, half_period_us, "preamble sent");
        transitions.request(SyncStep::InitiateWaitForConfirmation);
    }
}

/// Wait, bounded, for the Receiver's confirmation pulse.
pub struct WaitForConfirmation;

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for WaitForConfirmation {
    fn id(&self) -> SyncStep {
        SyncStep::InitiateWaitForConfirmation
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let window = ctx.config.confirmation_window;
        let timeout_us = ctx.config.confirmation_timeout_us;

        match ctx.hw.pulse_in(Level::High, timeout_us) {
            Some(measured_us) if window.contains(measured_us) => {
                debug!(measured_us, "confirmation received");
                transitions.request(SyncStep::InitiateSendFinalTrigger);
            }
            Some(measured_us) => fail(
                ctx,
                Role::Initiate,
                transitions,
                SyncFailure::TimingViolation {
                    phase: Phase::Confirmation,
                    measured_us,
                    min_us: window.min_us,
                    max_us: window.max_us,
                },
            ),
            None => fail(
                ctx,
                Role::Initiate,
                transitions,
                SyncFailure::MissingPulse {
                    phase: Phase::Confirmation,
                    timeout_us,
                },
            ),
        }
    }
}

/// Raise the line and let a one-shot timer drop it.
///
/// The timer callback runs in interrupt context: it pulls the line low and
/// sets `done`, which the next tick observes.
pub struct SendFinalTrigger<H: Hardware> {
    tx: H::Pin,
    timer: H::Timer,
    done: Arc<AtomicBool>,
    started: bool,
}

impl<H: Hardware> SendFinalTrigger<H> {
    pub fn new(hw: &mut H) -> Self {
        let tx = hw.tx_pin();
        let done = Arc::new(AtomicBool::new(false));
        let timer = {
            let mut tx = tx.clone();
            let done = Arc::clone(&done);
            hw.one_shot(Box::new(move || {
                tx.set_level(Level::Low);
                done.store(true, Ordering::Release);
            }))
        };
        Self {
            tx,
            timer,
            done,
            started: false,
        }
    }
}

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for SendFinalTrigger<H> {
    fn id(&self) -> SyncStep {
        SyncStep::InitiateSendFinalTrigger
    }

    fn enter(&mut self, _task: Option<()>, _ctx: &mut DeviceContext<H>) {
        self.started = false;
        self.done.store(false, Ordering::Release);
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        if !self.started {
            self.started = true;
            let width_us = ctx.config.trigger_pulse_us;
            ctx.attempt_mut(Role::Initiate).trigger_at_us = Some(ctx.hw.now_us());
            self.tx.set_level(Level::High);
            self.timer.start(width_us);
            debug!(width_us, "final trigger raised");
            return;
        }

        if self.done.swap(false, Ordering::AcqRel) {
            self.timer.stop();
            transitions.request(SyncStep::Synced);
        }
    }
}
