//! Steps shared by both roles: parked, synchronized action and failure.

use super::{SyncOutcome, SyncStep};
use crate::config::SyncConfig;
use crate::context::DeviceContext;
use crate::engine::{StateHandler, Transitions};
use crate::hal::{Hardware, OneShotTimer, OutputPin};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The nested machine's resting step. Does nothing.
pub struct Parked;

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for Parked {
    fn id(&self) -> SyncStep {
        SyncStep::Idle
    }

    fn handle(&mut self, _ctx: &mut DeviceContext<H>, _transitions: &Transitions<SyncStep, ()>) {}
}

/// Fire the synchronized action a fixed number of half periods after the
/// final trigger's rising edge.
///
/// The delay is shortened by the time elapsed since the attempt recorded
/// the trigger, so poll latency on either side does not add up.
///
/// The action itself runs in the timer callback; the tick only arms the
/// timer once and then polls `done`.
pub struct Synced<H: Hardware> {
    timer: H::Timer,
    done: Arc<AtomicBool>,
    started: bool,
    pulse_width_us: u32,
}

impl<H: Hardware> Synced<H> {
    pub fn new(hw: &mut H, config: &SyncConfig) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let timer = {
            let mut action = hw.action_pin();
            let width_us = config.action_pulse_us;
            let done = Arc::clone(&done);
            hw.one_shot(Box::new(move || {
                action.pulse(width_us);
                done.store(true, Ordering::Release);
            }))
        };
        Self {
            timer,
            done,
            started: false,
            pulse_width_us: config.preamble_half_period_us,
        }
    }
}

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for Synced<H> {
    fn id(&self) -> SyncStep {
        SyncStep::Synced
    }

    fn enter(&mut self, _task: Option<()>, _ctx: &mut DeviceContext<H>) {
        self.started = false;
        self.done.store(false, Ordering::Release);
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        if !self.started {
            self.started = true;
            let attempt = ctx.attempt.as_ref();
            let pulse_width_us = match attempt.and_then(|a| a.pulse_width_us) {
                Some(width) => width,
                None => {
                    warn!("no discovered pulse width; using the configured half period");
                    ctx.config.preamble_half_period_us
                }
            };
            // Ticks spent since the trigger already count toward the delay.
            let lead_us = attempt
                .and_then(|a| a.trigger_at_us)
                .map_or(0, |at| ctx.hw.now_us().saturating_sub(at));
            let delay_us = ctx
                .config
                .action_delay_us(pulse_width_us)
                .saturating_sub(u32::try_from(lead_us).unwrap_or(u32::MAX));
            debug!(pulse_width_us, lead_us, delay_us, "action timer armed");

            self.pulse_width_us = pulse_width_us;
            self.timer.start(delay_us);
            return;
        }

        if self.done.swap(false, Ordering::AcqRel) {
            self.timer.stop();
            ctx.outcome = Some(SyncOutcome::Synced {
                pulse_width_us: self.pulse_width_us,
            });
            info!(pulse_width_us = self.pulse_width_us, "synchronized action fired");
            transitions.request(SyncStep::Idle);
        }
    }
}

/// Report the failure of the current attempt and park.
pub struct Timeout;

impl<H: Hardware> StateHandler<SyncStep, (), DeviceContext<H>> for Timeout {
    fn id(&self) -> SyncStep {
        SyncStep::Timeout
    }

    fn handle(&mut self, ctx: &mut DeviceContext<H>, transitions: &Transitions<SyncStep, ()>) {
        let failure = ctx.attempt.as_mut().and_then(|a| a.failure.take());
        match &failure {
            Some(failure) => warn!(%failure, "handshake failed"),
            None => warn!("handshake failed"),
        }
        ctx.outcome = Some(SyncOutcome::Failed { failure });
        transitions.request(SyncStep::Idle);
    }
}
