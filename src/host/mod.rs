// src/host/mod.rs

//! Driver-host delivery layer.
//!
//! The coordinator never talks to driver hosts directly; it hands suspend
//! messages to a [`DriverHostBackend`]. Production embedders forward those
//! messages to whatever owns the host connections and report outcomes back
//! as [`crate::coordinator::CoordinatorEvent::SuspendDone`] events; tests
//! substitute a fake backend that completes immediately.

pub mod backend;

pub use backend::{ChannelHostBackend, DriverHostBackend};
