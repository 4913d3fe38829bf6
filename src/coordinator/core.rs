// src/coordinator/core.rs

//! Pure core state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`CoordinatorEvent`]s and produces:
//! - an updated device tree and task graph
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`coordinator::runtime::Runtime`) is responsible
//! for reading events from channels and delivering suspend messages to
//! driver hosts.
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, or host connections.

use tracing::{debug, warn};

use crate::coordinator::context::{CoordContext, CoreCommand};
use crate::coordinator::{CoordinatorEvent, CoordinatorOptions};
use crate::device::DeviceTree;
use crate::task::suspend::SuspendTask;
use crate::task::TaskEngine;

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Pure core: owns the device tree, the task engine, and the options.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct Coordinator {
    engine: TaskEngine<CoordContext>,
    cx: CoordContext,
    options: CoordinatorOptions,
}

impl Coordinator {
    pub fn new(devices: DeviceTree, options: CoordinatorOptions) -> Self {
        Self {
            engine: TaskEngine::new(),
            cx: CoordContext::new(devices),
            options,
        }
    }

    pub fn devices(&self) -> &DeviceTree {
        &self.cx.devices
    }

    /// The tree is dynamic; embedders may add devices or mark them dead
    /// between steps.
    pub fn devices_mut(&mut self) -> &mut DeviceTree {
        &mut self.cx.devices
    }

    /// True when no task is pending and nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    /// Handle a single event, advance every task that became runnable, and
    /// return the resulting commands for the IO shell.
    pub fn step(&mut self, event: CoordinatorEvent) -> CoreStep {
        let mut keep_running = true;
        match event {
            CoordinatorEvent::SuspendRequested { device, flags } => {
                if !self.cx.devices.contains(device) {
                    warn!(?device, "suspend requested for unknown device; ignoring");
                } else {
                    SuspendTask::create(
                        &mut self.engine,
                        &mut self.cx,
                        device,
                        flags,
                        Box::new(move |cx, status| {
                            cx.commands.push(CoreCommand::SuspendFinished {
                                device,
                                status: status.clone(),
                            });
                        }),
                    );
                }
            }
            CoordinatorEvent::SuspendDone { task, status } => {
                // Hosts live on the other side of a channel; validate here
                // so a stale or duplicated completion cannot trip the
                // engine's single-completion contract.
                if !self.engine.contains(task) || self.engine.is_completed(task) {
                    warn!(
                        task = task.index(),
                        "completion for unknown or finished task; ignoring"
                    );
                } else {
                    self.engine.complete(&mut self.cx, task, status);
                }
            }
            CoordinatorEvent::ShutdownRequested => {
                keep_running = false;
            }
        }

        self.engine.run_until_stalled(&mut self.cx);
        let commands = std::mem::take(&mut self.cx.commands);
        debug!(
            commands = commands.len(),
            pending = self.engine.pending_tasks(),
            "core step finished"
        );

        if self.options.exit_when_idle && self.engine.is_idle() {
            keep_running = false;
        }

        CoreStep {
            commands,
            keep_running,
        }
    }
}
