//! Error types for device construction.

use crate::builder::BuildError;
use crate::config::ConfigError;
use crate::edge::EdgeError;
use thiserror::Error;

/// Why a [`Device`](super::Device) could not be set up.
///
/// Handshake failures are not errors: they end in the nested machine's
/// `Timeout` step and are reported through the device's outcome.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Edge(#[from] EdgeError),
}
