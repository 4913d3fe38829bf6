// src/coordinator/runtime.rs

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::core::{Coordinator, CoreStep};
use crate::coordinator::{CoordinatorEvent, CoreCommand};
use crate::errors::Result;
use crate::host::DriverHostBackend;

/// Drives the coordinator core in response to [`CoordinatorEvent`]s and
/// delegates suspend delivery to a [`DriverHostBackend`].
///
/// This is a pure IO shell around [`Coordinator`], which contains all the
/// semantics. A suspend message that fails to dispatch never gets a host
/// completion, so the failure is fed straight back into the core as a
/// failed completion.
pub struct Runtime<B: DriverHostBackend> {
    core: Coordinator,
    event_rx: mpsc::Receiver<CoordinatorEvent>,
    backend: B,
}

impl<B: DriverHostBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: DriverHostBackend> Runtime<B> {
    pub fn new(core: Coordinator, event_rx: mpsc::Receiver<CoordinatorEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes [`CoordinatorEvent`]s from `event_rx`.
    /// - Feeds them into the pure core.
    /// - Executes the commands returned by the core.
    pub async fn run(mut self) -> Result<()> {
        info!("device coordinator runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            if !self.process(event).await {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Feed one event through the core, executing commands until none are
    /// left. Returns whether the loop should keep running.
    async fn process(&mut self, event: CoordinatorEvent) -> bool {
        let mut keep_running = true;
        let mut steps: VecDeque<CoreStep> = VecDeque::new();
        steps.push_back(self.core.step(event));

        while let Some(step) = steps.pop_front() {
            keep_running &= step.keep_running;
            for command in step.commands {
                match command {
                    CoreCommand::SendSuspend(request) => {
                        let task = request.task;
                        let device = request.device_name.clone();
                        if let Err(error) = self.backend.send_suspend(request).await {
                            warn!(device = %device, %error, "suspend dispatch failed");
                            steps.push_back(self.core.step(CoordinatorEvent::SuspendDone {
                                task,
                                status: Err(error),
                            }));
                        }
                    }
                    CoreCommand::SuspendFinished { device, status } => {
                        info!(?device, ok = status.is_ok(), "suspend request finished");
                    }
                }
            }
        }

        keep_running
    }
}
