// src/task/suspend.rs

//! Suspend traversal policy.
//!
//! One [`SuspendTask`] suspends one device. Each run of the task works
//! through the next wave of prerequisites:
//!
//! 1. every child that is not already suspended or dead must suspend first;
//! 2. then the proxy, if any — proxies may depend on the device's children
//!    having already released resources;
//! 3. only then is the device's own suspend issued to its driver host.
//!
//! Child and proxy suspends are tasks of their own, requested through the
//! device's `active_suspend` slot so that shared devices are suspended once,
//! not once per dependent.

use tracing::{debug, trace, warn};

use crate::coordinator::{CoordContext, CoreCommand};
use crate::device::{DeviceId, DeviceState};
use crate::errors::TaskStatus;
use crate::task::engine::{Completion, StepOutcome, TaskEngine, TaskId, Work};
use crate::types::{HostId, SuspendFlags};

/// Suspend message handed to the driver-host delivery layer.
#[derive(Debug, Clone)]
pub struct SuspendRequest {
    /// Task to complete when the host reports back.
    pub task: TaskId,
    pub device: DeviceId,
    pub device_name: String,
    pub host: HostId,
    pub flags: SuspendFlags,
}

/// Task that suspends one device after its children and proxy.
pub struct SuspendTask {
    device: DeviceId,
    flags: SuspendFlags,
}

impl SuspendTask {
    pub fn new(device: DeviceId, flags: SuspendFlags) -> Self {
        Self { device, flags }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn flags(&self) -> SuspendFlags {
        self.flags
    }

    /// Return the device's in-flight suspend task, creating one if needed.
    ///
    /// The created task clears the device's `active_suspend` slot on
    /// completion and, on success, marks the device suspended.
    pub fn request(
        engine: &mut TaskEngine<CoordContext>,
        cx: &mut CoordContext,
        device: DeviceId,
        flags: SuspendFlags,
    ) -> TaskId {
        if let Some(existing) = cx.devices.device(device).active_suspend {
            trace!(device = %cx.devices.device(device).name, "reusing in-flight suspend task");
            return existing;
        }
        let id = engine.spawn(
            SuspendTask::new(device, flags),
            Some(Box::new(move |cx: &mut CoordContext, status: &TaskStatus| {
                settle_device(cx, device, status);
            })),
        );
        cx.devices.device_mut(device).active_suspend = Some(id);
        id
    }

    /// Entry point for a caller-initiated suspend: like
    /// [`request`](Self::request), but with a caller completion chained
    /// after the device bookkeeping.
    ///
    /// At most one suspend task may exist per device; if one is already in
    /// flight the existing task is returned and the new completion dropped.
    pub fn create(
        engine: &mut TaskEngine<CoordContext>,
        cx: &mut CoordContext,
        device: DeviceId,
        flags: SuspendFlags,
        completion: Completion<CoordContext>,
    ) -> TaskId {
        if let Some(existing) = cx.devices.device(device).active_suspend {
            warn!(
                device = %cx.devices.device(device).name,
                "suspend already in flight; dropping new completion"
            );
            return existing;
        }
        let id = engine.spawn(
            SuspendTask::new(device, flags),
            Some(Box::new(move |cx: &mut CoordContext, status: &TaskStatus| {
                settle_device(cx, device, status);
                completion(cx, status);
            })),
        );
        cx.devices.device_mut(device).active_suspend = Some(id);
        id
    }
}

impl Work<CoordContext> for SuspendTask {
    fn run(
        &mut self,
        id: TaskId,
        engine: &mut TaskEngine<CoordContext>,
        cx: &mut CoordContext,
    ) -> StepOutcome {
        let device = self.device;
        if matches!(
            cx.devices.device(device).state,
            DeviceState::Suspended | DeviceState::Dead
        ) {
            // Already quiescent; nothing left to do.
            return StepOutcome::Done(Ok(()));
        }

        // Children first. Every child still awake becomes a dependency; if
        // any were found, the proxy and the device itself wait for the next
        // wave, when the children are suspended or dead.
        let children: Vec<DeviceId> = cx.devices.children(device).to_vec();
        let mut deps = Vec::new();
        for child in children {
            match cx.devices.device(child).state {
                DeviceState::Dead | DeviceState::Suspended => continue,
                DeviceState::Active | DeviceState::Suspending => {
                    deps.push(SuspendTask::request(engine, cx, child, self.flags));
                }
            }
        }
        if !deps.is_empty() {
            trace!(
                device = %cx.devices.device(device).name,
                children = deps.len(),
                "suspend waiting on children"
            );
            return StepOutcome::Wait(deps);
        }

        // Children quiescent: the proxy goes next.
        if let Some(proxy) = cx.devices.device(device).proxy {
            if !matches!(
                cx.devices.device(proxy).state,
                DeviceState::Dead | DeviceState::Suspended
            ) {
                trace!(device = %cx.devices.device(device).name, "suspend waiting on proxy");
                let task = SuspendTask::request(engine, cx, proxy, self.flags);
                return StepOutcome::Wait(vec![task]);
            }
        }

        // Nothing left below us: suspend the device itself.
        let dev = cx.devices.device(device);
        let Some(host) = dev.host else {
            debug!(device = %dev.name, "no driver host; nothing to suspend");
            return StepOutcome::Done(Ok(()));
        };
        let request = SuspendRequest {
            task: id,
            device,
            device_name: dev.name.clone(),
            host,
            flags: self.flags,
        };
        debug!(device = %dev.name, host = host.0, flags = ?self.flags, "sending suspend");
        cx.devices.device_mut(device).state = DeviceState::Suspending;
        cx.commands.push(CoreCommand::SendSuspend(request));
        StepOutcome::InFlight
    }
}

/// Device bookkeeping bound to every suspend task's completion: free the
/// `active_suspend` slot and record the resulting device state.
fn settle_device(cx: &mut CoordContext, device: DeviceId, status: &TaskStatus) {
    let dev = cx.devices.device_mut(device);
    dev.active_suspend = None;
    match status {
        Ok(()) => {
            if dev.state != DeviceState::Dead {
                dev.state = DeviceState::Suspended;
            }
            debug!(device = %dev.name, "device suspended");
        }
        Err(error) => {
            warn!(device = %dev.name, %error, "suspend failed; device state left as-is");
        }
    }
}
