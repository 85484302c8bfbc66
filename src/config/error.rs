//! Configuration errors.

use thiserror::Error;

/// A single rule a [`SyncConfig`](super::SyncConfig) broke.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigViolation {
    #[error("{window} window is inverted: min {min_us}us > max {max_us}us")]
    InvertedWindow {
        window: &'static str,
        min_us: u32,
        max_us: u32,
    },

    #[error("nominal {pulse} pulse of {nominal_us}us lies outside its window [{min_us}, {max_us}]")]
    NominalOutsideWindow {
        pulse: &'static str,
        nominal_us: u32,
        min_us: u32,
        max_us: u32,
    },

    #[error("wake-up and confirmation windows overlap")]
    OverlappingWindows,

    #[error("preamble must contain at least one pulse")]
    EmptyPreamble,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("preamble timeout {timeout_us}us does not exceed the half period {half_period_us}us")]
    PreambleTimeoutTooShort { timeout_us: u32, half_period_us: u32 },

    #[error("trigger pulse {trigger_us}us is not shorter than the action delay {delay_us}us")]
    TriggerExceedsActionDelay { trigger_us: u32, delay_us: u32 },

    #[error("sync pin {pin} exceeds the highest supported pin {max}")]
    PinOutOfRange { pin: u8, max: u8 },
}

/// Errors produced when loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {}", summarize(.violations))]
    Invalid { violations: Vec<ConfigViolation> },
}

fn summarize(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
