//! Capabilities consumed from the hardware collaborator.
//!
//! The handshake never touches registers. A board support layer implements
//! [`Hardware`] on top of its GPIO, timer and interrupt primitives; the host
//! simulation in [`crate::sim`] implements it in virtual time.

use serde::{Deserialize, Serialize};

/// Logic level of a pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

impl std::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Edge an interrupt is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Change,
}

/// Interrupt entry point; receives the pin that fired.
pub type EdgeHandler = fn(u8);

/// Callback run in interrupt context when a one-shot timer expires.
pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;

/// An output pin that may also be driven from interrupt context.
pub trait OutputPin: Clone + Send + 'static {
    fn set_level(&mut self, level: Level);

    /// Drive the pin high for `width_us`, busy-waiting, then low.
    fn pulse(&mut self, width_us: u32);
}

/// A hardware one-shot timer. Dropping the timer releases it.
pub trait OneShotTimer: 'static {
    /// Arm the timer to fire once after `delay_us`, replacing any earlier
    /// arming.
    fn start(&mut self, delay_us: u32);

    /// Disarm the timer. Stopping an idle timer is a no-op.
    fn stop(&mut self);
}

/// Everything the handshake needs from a board.
pub trait Hardware: 'static {
    type Pin: OutputPin;
    type Timer: OneShotTimer;

    /// Output driving the synchronization line.
    fn tx_pin(&self) -> Self::Pin;

    /// Output pulsed by the synchronized action.
    fn action_pin(&self) -> Self::Pin;

    /// Current level of the synchronization input.
    fn read(&mut self) -> Level;

    /// Block until a complete pulse at `level` is seen on the input and
    /// return its duration, or `None` if none completes within `timeout_us`.
    fn pulse_in(&mut self, level: Level, timeout_us: u32) -> Option<u32>;

    /// Busy-wait for `us` microseconds.
    fn delay_us(&mut self, us: u32);

    /// Free-running microsecond clock.
    fn now_us(&self) -> u64;

    /// Allocate a one-shot timer whose expiry runs `callback`.
    fn one_shot(&mut self, callback: TimerCallback) -> Self::Timer;

    fn attach_edge_interrupt(&mut self, pin: u8, edge: Edge, handler: EdgeHandler);

    fn detach_edge_interrupt(&mut self, pin: u8);
}
