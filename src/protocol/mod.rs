//! Top-level protocol machine.
//!
//! The parent machine rests in `Idle` and hands control to the `Sync`
//! coordinator with a [`Role`](crate::handshake::Role) task. `Tx` and `Rx`
//! are reserved identifiers with no registered state; requesting them
//! suspends dispatch until the next transition.

mod coordinator;
mod device;
pub mod error;
mod idle;

pub use coordinator::SyncCoordinator;
pub use device::Device;
pub use error::DeviceError;
pub use idle::IdleState;

use crate::state_enum;

state_enum! {
    /// Identifiers of the top-level machine.
    pub enum MasterState {
        Idle,
        Sync,
        Tx,
        Rx,
    }
}
