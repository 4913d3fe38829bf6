// src/lib.rs

//! Dependency-ordered suspend orchestration for a device tree.
//!
//! `devcoord` schedules asynchronous, dependency-gated operations —
//! principally suspend — across a dynamically-changing tree of devices. A
//! device suspends only after its children, then its proxy, have suspended;
//! the crate turns that ordering into a graph of tasks and drives it to
//! completion on a single logical executor.
//!
//! Layering, outside in:
//! - [`coordinator::Runtime`] — async shell: an mpsc event loop that feeds
//!   the core and delivers suspend messages through a
//!   [`host::DriverHostBackend`].
//! - [`coordinator::Coordinator`] — pure core: owns the
//!   [`device::DeviceTree`] and the [`task::TaskEngine`], consumes
//!   [`coordinator::CoordinatorEvent`]s, returns commands.
//! - [`task`] — the generic dependency-scheduling engine and the suspend
//!   traversal policy built on it.
//!
//! There is no wire format, file format, or CLI here; this is an in-process
//! orchestration primitive for embedding in a device coordinator.

pub mod coordinator;
pub mod device;
pub mod errors;
pub mod host;
pub mod logging;
pub mod task;
pub mod types;
