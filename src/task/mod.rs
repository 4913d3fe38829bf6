// src/task/mod.rs

//! Dependency-gated task scheduling.
//!
//! - [`engine`] is the generic "wait for N dependencies, run, notify M
//!   dependents" primitive. It knows nothing about devices.
//! - [`suspend`] is the suspend-specific policy built on it: how one
//!   device's suspend decomposes into its children, its proxy, and finally
//!   the device's own suspend message.
//!
//! Further operations over the device tree (resume, unbind) would be new
//! [`engine::Work`] implementations beside [`suspend::SuspendTask`].

pub mod engine;
pub mod suspend;

pub use engine::{Completion, FailureAction, StepOutcome, TaskEngine, TaskId, Work};
pub use suspend::{SuspendRequest, SuspendTask};
