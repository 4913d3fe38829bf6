// src/coordinator/context.rs

//! Shared mutable state threaded through task runs and completions.

use crate::device::{DeviceId, DeviceTree};
use crate::errors::TaskStatus;
use crate::task::suspend::SuspendRequest;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Deliver this suspend message to the device's driver host.
    SendSuspend(SuspendRequest),
    /// A caller-initiated suspend ran to completion with this status.
    SuspendFinished {
        device: DeviceId,
        status: TaskStatus,
    },
}

/// The collaborator context the task engine is instantiated with.
///
/// Tasks read and update devices through `devices` and stage outbound work
/// in `commands`; the core moves staged commands into each step's result.
#[derive(Debug)]
pub struct CoordContext {
    pub devices: DeviceTree,
    pub commands: Vec<CoreCommand>,
}

impl CoordContext {
    pub fn new(devices: DeviceTree) -> Self {
        Self {
            devices,
            commands: Vec::new(),
        }
    }
}
