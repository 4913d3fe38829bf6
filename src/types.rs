/// Variant of suspend being performed across the device tree.
///
/// The flag is chosen by the caller that initiates a suspend and carried
/// unchanged into every task the operation fans out into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuspendFlags {
    /// Suspend to RAM; devices are expected to be resumable afterwards.
    SuspendToRam,
    /// Full power-off.
    Poweroff,
    /// Reboot.
    Reboot,
    /// Suspend ahead of executing a new kernel image in place.
    Mexec,
}

/// Opaque handle to the execution context a device's driver instance runs in.
///
/// A device without a host has no live driver instance and is treated as
/// trivially suspendable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(pub u32);
