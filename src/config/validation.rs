//! Accumulating validation of [`SyncConfig`].
//!
//! Uses Stillwater's `Validation` so a bad configuration reports every
//! broken rule in one pass instead of stopping at the first.

use super::{ConfigError, ConfigViolation, PulseWindow, SyncConfig};
use crate::edge::MAX_PINS;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<ConfigViolation>>;

fn check(ok: bool, violation: impl FnOnce() -> ConfigViolation) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

fn ordered(name: &'static str, window: PulseWindow) -> Check {
    check(window.min_us <= window.max_us, || {
        ConfigViolation::InvertedWindow {
            window: name,
            min_us: window.min_us,
            max_us: window.max_us,
        }
    })
}

fn nominal_inside(pulse: &'static str, nominal_us: u32, window: PulseWindow) -> Check {
    check(window.contains(nominal_us), || {
        ConfigViolation::NominalOutsideWindow {
            pulse,
            nominal_us,
            min_us: window.min_us,
            max_us: window.max_us,
        }
    })
}

fn non_zero(field: &'static str, value: u32) -> Check {
    check(value > 0, || ConfigViolation::Zero { field })
}

pub(super) fn validate(config: &SyncConfig) -> Result<(), ConfigError> {
    let mut checks: Vec<Check> = vec![
        ordered("wake-up", config.initial_window),
        ordered("confirmation", config.confirmation_window),
        nominal_inside("wake-up", config.initial_pulse_us, config.initial_window),
        nominal_inside(
            "confirmation",
            config.confirmation_pulse_us,
            config.confirmation_window,
        ),
        check(
            !config.initial_window.overlaps(&config.confirmation_window),
            || ConfigViolation::OverlappingWindows,
        ),
        check(config.preamble_pulses > 0, || ConfigViolation::EmptyPreamble),
        check(
            config.preamble_timeout_us > config.preamble_half_period_us,
            || ConfigViolation::PreambleTimeoutTooShort {
                timeout_us: config.preamble_timeout_us,
                half_period_us: config.preamble_half_period_us,
            },
        ),
        check((config.sync_pin as usize) < MAX_PINS, || {
            ConfigViolation::PinOutOfRange {
                pin: config.sync_pin,
                max: (MAX_PINS - 1) as u8,
            }
        }),
    ];

    for (field, value) in [
        ("preamble_half_period_us", config.preamble_half_period_us),
        ("initial_timeout_us", config.initial_timeout_us),
        ("confirmation_timeout_us", config.confirmation_timeout_us),
        ("trigger_timeout_us", config.trigger_timeout_us),
        ("trigger_pulse_us", config.trigger_pulse_us),
        ("action_delay_multiplier", config.action_delay_multiplier),
    ] {
        checks.push(non_zero(field, value));
    }

    // The Initiator subtracts its trigger width from the action delay.
    let delay_us = config.action_delay_us(config.preamble_half_period_us);
    checks.push(check(config.trigger_pulse_us < delay_us, || {
        ConfigViolation::TriggerExceedsActionDelay {
            trigger_us: config.trigger_pulse_us,
            delay_us,
        }
    }));

    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Success(()) => Ok(()),
        Validation::Failure(errors) => Err(ConfigError::Invalid {
            violations: errors.iter().cloned().collect(),
        }),
    }
}
