// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

use crate::device::DeviceId;

/// Reason a task finished unsuccessfully.
///
/// The scheduling engine only distinguishes success from non-success; the
/// concrete variant is carried through completion callbacks for the caller's
/// benefit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("suspend message could not be delivered to the driver host")]
    Dispatch,

    #[error("driver host reported failure (status {0})")]
    Driver(i32),
}

/// Terminal status of a task, delivered exactly once on completion.
pub type TaskStatus = std::result::Result<(), TaskError>;

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("unknown device id {0:?}")]
    UnknownDevice(DeviceId),

    #[error("device `{0}` is dead")]
    DeviceDead(String),

    #[error("device `{0}` already has a proxy")]
    ProxyExists(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CoordError>;
