// src/device/tree.rs

//! Slab-backed storage for the device tree.

use std::fmt::Write as _;

use slab::Slab;
use tracing::debug;

use crate::device::state::DeviceState;
use crate::errors::{CoordError, Result};
use crate::task::TaskId;
use crate::types::HostId;

/// Stable handle to a device owned by a [`DeviceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub(crate) usize);

/// One device object in the tree.
#[derive(Debug)]
pub struct Device {
    pub name: String,
    pub state: DeviceState,
    /// Parent in the tree; `None` only for the root. A proxy's parent is the
    /// device it proxies for, but a proxy is never in its parent's
    /// `children` list.
    pub parent: Option<DeviceId>,
    pub children: Vec<DeviceId>,
    /// Secondary device object representing how this device is reached from
    /// a different execution context.
    pub proxy: Option<DeviceId>,
    /// Execution context the device's driver instance runs in. `None` means
    /// there is no live instance and the device is trivially suspendable.
    pub host: Option<HostId>,
    /// In-flight suspend task for this device, if any. At most one suspend
    /// task exists per device at a time; this slot is how repeated requests
    /// find the existing one.
    pub active_suspend: Option<TaskId>,
}

/// The tree of devices the coordinator orchestrates.
///
/// Devices are stored in a slab and referenced by [`DeviceId`]. The tree is
/// dynamic: devices may be added or marked dead while operations are in
/// flight. Devices are never removed from the slab; a removed device is
/// marked [`DeviceState::Dead`] and keeps its slot.
#[derive(Debug)]
pub struct DeviceTree {
    devices: Slab<Device>,
    root: DeviceId,
}

impl DeviceTree {
    /// Create a tree containing only the root device (active, no host).
    pub fn new() -> Self {
        let mut devices = Slab::new();
        let root = DeviceId(devices.insert(Device {
            name: "root".to_string(),
            state: DeviceState::Active,
            parent: None,
            children: Vec::new(),
            proxy: None,
            host: None,
            active_suspend: None,
        }));
        Self { devices, root }
    }

    pub fn root(&self) -> DeviceId {
        self.root
    }

    /// Add a device under `parent`.
    pub fn add_device(
        &mut self,
        parent: DeviceId,
        name: impl Into<String>,
        host: Option<HostId>,
    ) -> Result<DeviceId> {
        let name = name.into();
        {
            let p = self
                .devices
                .get(parent.0)
                .ok_or(CoordError::UnknownDevice(parent))?;
            if p.state == DeviceState::Dead {
                return Err(CoordError::DeviceDead(p.name.clone()));
            }
        }
        let id = DeviceId(self.devices.insert(Device {
            name: name.clone(),
            state: DeviceState::Active,
            parent: Some(parent),
            children: Vec::new(),
            proxy: None,
            host,
            active_suspend: None,
        }));
        self.devices[parent.0].children.push(id);
        debug!(device = %name, parent = %self.devices[parent.0].name, "device added");
        Ok(id)
    }

    /// Attach a proxy device to `device`. The proxy is named
    /// `<device>-proxy` and is not part of the device's `children`.
    pub fn add_proxy(&mut self, device: DeviceId, host: Option<HostId>) -> Result<DeviceId> {
        let name = {
            let d = self
                .devices
                .get(device.0)
                .ok_or(CoordError::UnknownDevice(device))?;
            if d.proxy.is_some() {
                return Err(CoordError::ProxyExists(d.name.clone()));
            }
            format!("{}-proxy", d.name)
        };
        let id = DeviceId(self.devices.insert(Device {
            name: name.clone(),
            state: DeviceState::Active,
            parent: Some(device),
            children: Vec::new(),
            proxy: None,
            host,
            active_suspend: None,
        }));
        self.devices[device.0].proxy = Some(id);
        debug!(proxy = %name, "proxy attached");
        Ok(id)
    }

    pub fn set_state(&mut self, id: DeviceId, state: DeviceState) -> Result<()> {
        let d = self
            .devices
            .get_mut(id.0)
            .ok_or(CoordError::UnknownDevice(id))?;
        d.state = state;
        Ok(())
    }

    pub fn set_host(&mut self, id: DeviceId, host: Option<HostId>) -> Result<()> {
        let d = self
            .devices
            .get_mut(id.0)
            .ok_or(CoordError::UnknownDevice(id))?;
        d.host = host;
        Ok(())
    }

    /// Mark a device, its descendants, and their proxies as dead.
    ///
    /// Dead devices lose their host: there is nothing left to suspend.
    pub fn mark_dead(&mut self, id: DeviceId) -> Result<()> {
        if !self.devices.contains(id.0) {
            return Err(CoordError::UnknownDevice(id));
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let d = &mut self.devices[next.0];
            d.state = DeviceState::Dead;
            d.host = None;
            debug!(device = %d.name, "device marked dead");
            stack.extend(d.children.iter().copied());
            stack.extend(d.proxy);
        }
        Ok(())
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains(id.0)
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(id.0)
    }

    /// Borrow a device that is known to be live.
    ///
    /// Panics if the id is stale; devices are never removed from the slab,
    /// so a stale id indicates a handle from a different tree.
    pub fn device(&self, id: DeviceId) -> &Device {
        self.devices.get(id.0).expect("device id not in this tree")
    }

    pub fn device_mut(&mut self, id: DeviceId) -> &mut Device {
        self.devices
            .get_mut(id.0)
            .expect("device id not in this tree")
    }

    pub fn children(&self, id: DeviceId) -> &[DeviceId] {
        &self.device(id).children
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices.iter().map(|(k, d)| (DeviceId(k), d))
    }

    /// Render the tree for diagnostics: one line per device with its state
    /// and host, proxies marked as such.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_device(self.root, 0, false, &mut out);
        out
    }

    fn dump_device(&self, id: DeviceId, depth: usize, is_proxy: bool, out: &mut String) {
        let d = self.device(id);
        let indent = "  ".repeat(depth);
        let marker = if is_proxy { " (proxy)" } else { "" };
        let _ = write!(out, "{indent}{} [{}]{marker}", d.name, d.state);
        if let Some(host) = d.host {
            let _ = write!(out, " (host {})", host.0);
        }
        out.push('\n');
        if let Some(proxy) = d.proxy {
            self.dump_device(proxy, depth + 1, true, out);
        }
        for child in &d.children {
            self.dump_device(*child, depth + 1, false, out);
        }
    }
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_device_links_parent_and_child() {
        let mut tree = DeviceTree::new();
        let root = tree.root();
        let dev = tree.add_device(root, "sys", Some(HostId(1))).unwrap();

        assert_eq!(tree.children(root), &[dev]);
        assert_eq!(tree.device(dev).parent, Some(root));
        assert_eq!(tree.device(dev).state, DeviceState::Active);
    }

    #[test]
    fn proxy_is_not_a_child() {
        let mut tree = DeviceTree::new();
        let dev = tree.add_device(tree.root(), "pci", None).unwrap();
        let proxy = tree.add_proxy(dev, Some(HostId(2))).unwrap();

        assert_eq!(tree.device(dev).proxy, Some(proxy));
        assert!(tree.children(dev).is_empty());
        assert_eq!(tree.device(proxy).name, "pci-proxy");
        assert!(matches!(
            tree.add_proxy(dev, None),
            Err(CoordError::ProxyExists(_))
        ));
    }

    #[test]
    fn mark_dead_covers_descendants_and_proxies() {
        let mut tree = DeviceTree::new();
        let a = tree.add_device(tree.root(), "a", Some(HostId(1))).unwrap();
        let b = tree.add_device(a, "b", Some(HostId(1))).unwrap();
        let p = tree.add_proxy(b, Some(HostId(2))).unwrap();

        tree.mark_dead(a).unwrap();
        for id in [a, b, p] {
            assert_eq!(tree.device(id).state, DeviceState::Dead);
            assert_eq!(tree.device(id).host, None);
        }
        assert_eq!(tree.device(tree.root()).state, DeviceState::Active);
    }

    #[test]
    fn dump_renders_every_device() {
        let mut tree = DeviceTree::new();
        let a = tree.add_device(tree.root(), "audio", Some(HostId(1))).unwrap();
        tree.add_proxy(a, None).unwrap();

        let dump = tree.dump();
        assert!(dump.contains("root [active]"));
        assert!(dump.contains("audio [active] (host 1)"));
        assert!(dump.contains("audio-proxy [active] (proxy)"));
    }
}
