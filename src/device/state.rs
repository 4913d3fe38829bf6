// src/device/state.rs

use std::fmt;

/// Lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Device is running normally.
    Active,
    /// A suspend is in flight for this device.
    Suspending,
    /// Device has completed a suspend.
    Suspended,
    /// Device has been removed or its driver has died; nothing to suspend.
    Dead,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceState::Active => "active",
            DeviceState::Suspending => "suspending",
            DeviceState::Suspended => "suspended",
            DeviceState::Dead => "dead",
        };
        f.write_str(s)
    }
}
