// src/device/mod.rs

//! Device tree model.
//!
//! - [`state`] defines the per-device lifecycle state.
//! - [`tree`] holds the slab-backed tree of device objects: parent/child
//!   links, the optional proxy, the hosting execution context, and the
//!   per-device in-flight suspend task slot.
//!
//! The tree is a collaborator of the task scheduler, not part of it: tasks
//! query and update devices, but devices never own tasks beyond the
//! `active_suspend` bookkeeping slot.

pub mod state;
pub mod tree;

pub use state::DeviceState;
pub use tree::{Device, DeviceId, DeviceTree};
