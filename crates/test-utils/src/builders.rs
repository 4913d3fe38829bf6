#![allow(dead_code)]

use std::collections::HashMap;

use devcoord::device::{DeviceId, DeviceState, DeviceTree};
use devcoord::types::HostId;

/// Builder for a [`DeviceTree`] to simplify test setup.
///
/// Devices are referred to by name; the root is pre-registered as `"root"`.
/// `build` returns the tree plus the name → id map for assertions.
pub struct DeviceTreeBuilder {
    tree: DeviceTree,
    ids: HashMap<String, DeviceId>,
}

impl DeviceTreeBuilder {
    pub fn new() -> Self {
        let tree = DeviceTree::new();
        let mut ids = HashMap::new();
        ids.insert("root".to_string(), tree.root());
        Self { tree, ids }
    }

    /// Add a device under the named parent.
    pub fn device(mut self, name: &str, parent: &str, host: Option<u32>) -> Self {
        let parent = self.ids[parent];
        let id = self
            .tree
            .add_device(parent, name, host.map(HostId))
            .expect("builder: add_device");
        self.ids.insert(name.to_string(), id);
        self
    }

    /// Attach a proxy to the named device; registered as `<name>-proxy`.
    pub fn proxy(mut self, of: &str, host: Option<u32>) -> Self {
        let device = self.ids[of];
        let id = self
            .tree
            .add_proxy(device, host.map(HostId))
            .expect("builder: add_proxy");
        self.ids.insert(format!("{of}-proxy"), id);
        self
    }

    /// Override the named device's state.
    pub fn state(mut self, name: &str, state: DeviceState) -> Self {
        let id = self.ids[name];
        self.tree.set_state(id, state).expect("builder: set_state");
        self
    }

    pub fn build(self) -> (DeviceTree, HashMap<String, DeviceId>) {
        (self.tree, self.ids)
    }
}

impl Default for DeviceTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
