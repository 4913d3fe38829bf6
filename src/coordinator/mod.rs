// src/coordinator/mod.rs

//! Orchestration layer around the task engine.
//!
//! This module ties together:
//! - the device tree and the task engine (owned by the pure core)
//! - the event stream that drives them:
//!   - caller-initiated suspend requests
//!   - completions reported by driver hosts
//!   - shutdown
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. The core consumes [`CoordinatorEvent`]s and
//! returns commands; the shell reads events from a channel and executes the
//! commands against a [`crate::host::DriverHostBackend`].

use crate::device::DeviceId;
use crate::errors::TaskStatus;
use crate::task::TaskId;
use crate::types::SuspendFlags;

/// Events flowing into the coordinator from callers and driver hosts.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// A caller asked for `device` (and everything beneath it) to suspend.
    SuspendRequested {
        device: DeviceId,
        flags: SuspendFlags,
    },
    /// A driver host reported the outcome of a previously sent suspend.
    SuspendDone { task: TaskId, status: TaskStatus },
    /// Graceful shutdown requested.
    ShutdownRequested,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    /// If true, stop the runtime once no task is pending (used by embedders
    /// that drive a single suspend to completion and exit).
    pub exit_when_idle: bool,
}

pub mod context;
pub mod core;
pub mod runtime;

pub use context::{CoordContext, CoreCommand};
pub use core::{Coordinator, CoreStep};
pub use runtime::Runtime;
