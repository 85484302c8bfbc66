//! Timing configuration for the synchronization handshake.
//!
//! Every pulse width, classification window and timeout the handshake uses
//! lives in [`SyncConfig`]. The defaults are the nominal protocol values;
//! a JSON document may override any subset of them.
//!
//! # Example
//!
//! ```rust
//! use pulsesync::config::SyncConfig;
//!
//! let config = SyncConfig::from_json(r#"{ "sync_pin": 12, "preamble_pulses": 32 }"#).unwrap();
//! assert_eq!(config.sync_pin, 12);
//! assert_eq!(config.preamble_pulses, 32);
//! assert_eq!(config.preamble_half_period_us, 500);
//! ```

pub mod error;
mod validation;

pub use error::{ConfigError, ConfigViolation};

use serde::{Deserialize, Serialize};

/// Inclusive range of accepted pulse durations, in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseWindow {
    pub min_us: u32,
    pub max_us: u32,
}

impl PulseWindow {
    pub const fn new(min_us: u32, max_us: u32) -> Self {
        Self { min_us, max_us }
    }

    /// Whether `duration_us` falls inside the window, bounds included.
    pub fn contains(&self, duration_us: u32) -> bool {
        (self.min_us..=self.max_us).contains(&duration_us)
    }

    /// Whether the windows share more than a single bound.
    ///
    /// Adjacent windows such as `[15_000, 20_000]` and `[20_000, 25_000]`
    /// do not overlap: each pulse is only ever classified against the
    /// window of the step waiting for it.
    pub fn overlaps(&self, other: &PulseWindow) -> bool {
        self.min_us < other.max_us && other.min_us < self.max_us
    }
}

/// Pin assignment and timing constants of the handshake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Pin watched by the edge detector outside of a handshake
    pub sync_pin: u8,

    /// Wake-up pulse emitted by the Initiator
    pub initial_pulse_us: u32,
    pub initial_window: PulseWindow,
    /// How long a Receiver listens for the wake-up pulse
    pub initial_timeout_us: u32,

    pub preamble_pulses: u32,
    /// High (and low) time of each preamble pulse
    pub preamble_half_period_us: u32,
    /// Bound on each single preamble level measurement
    pub preamble_timeout_us: u32,

    /// Confirmation pulse emitted by the Receiver
    pub confirmation_pulse_us: u32,
    pub confirmation_window: PulseWindow,
    pub confirmation_timeout_us: u32,

    pub trigger_pulse_us: u32,
    /// How long a Receiver waits for the final trigger
    pub trigger_timeout_us: u32,

    /// Action delay in units of the discovered half period
    pub action_delay_multiplier: u32,
    /// Width of the synchronized output pulse
    pub action_pulse_us: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_pin: 4,
            initial_pulse_us: 17_500,
            initial_window: PulseWindow::new(15_000, 20_000),
            initial_timeout_us: 100_000,
            preamble_pulses: 20,
            preamble_half_period_us: 500,
            preamble_timeout_us: 5_000,
            confirmation_pulse_us: 22_500,
            confirmation_window: PulseWindow::new(20_000, 25_000),
            confirmation_timeout_us: 100_000,
            trigger_pulse_us: 1_000,
            trigger_timeout_us: 50_000,
            action_delay_multiplier: 5,
            action_pulse_us: 100,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON document, filling absent fields with defaults, and
    /// validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every rule, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)
    }

    /// Delay between the final trigger and the synchronized action for a
    /// given half period.
    pub fn action_delay_us(&self, half_period_us: u32) -> u32 {
        half_period_us.saturating_mul(self.action_delay_multiplier)
    }
}
