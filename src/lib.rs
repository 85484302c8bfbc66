//! Pulsesync: a nestable state machine engine and a two-device pulse
//! synchronization handshake.
//!
//! Two devices share one GPIO pulse line. The Initiator sends a wake-up
//! pulse and a preamble of equal-width pulses; the Receiver measures the
//! preamble to discover the Initiator's half period, confirms, and both
//! fire a synchronized action a fixed number of half periods after the
//! Initiator's final trigger.
//!
//! # Core Concepts
//!
//! - **Engine**: a tick-driven machine over a fixed table of state handlers,
//!   with an interrupt-safe transition handle (last request wins)
//! - **Edge detection**: a sticky per-pin flag set from interrupt context and
//!   read-and-cleared by the main loop
//! - **Handshake**: a nested machine hosted by the top-level `Sync` state
//! - **Hardware**: consumed through the [`hal::Hardware`] capability trait;
//!   [`sim`] implements it in virtual time
//!
//! # Example
//!
//! ```rust
//! use pulsesync::config::SyncConfig;
//! use pulsesync::handshake::{Role, SyncOutcome};
//! use pulsesync::protocol::{Device, MasterState};
//! use pulsesync::sim::{SimBus, Waveform};
//!
//! let config = SyncConfig { sync_pin: 60, ..SyncConfig::default() };
//! let mut device = Device::new(SimBus::scripted(Waveform::new()), config).unwrap();
//!
//! device.begin(Role::Request);
//! while device.outcome().is_none() {
//!     device.poll();
//!     device.hardware_mut().advance(20);
//! }
//!
//! // Nobody answered: the Receiver gives up quietly.
//! assert_eq!(device.outcome(), Some(SyncOutcome::NoInitiator));
//! assert_eq!(device.state(), MasterState::Idle);
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod core;
pub mod edge;
pub mod engine;
pub mod hal;
pub mod handshake;
pub mod protocol;
pub mod sim;

// Re-export commonly used types
pub use builder::{BuildError, StateMachineBuilder};
pub use config::SyncConfig;
pub use core::{StateHistory, StateId, StateTransition};
pub use engine::{StateHandler, StateMachine, Transitions};
pub use handshake::{Role, SyncOutcome};
pub use protocol::{Device, DeviceError, MasterState};
