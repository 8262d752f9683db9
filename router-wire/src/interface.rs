//! Router interfaces: immutable after configuration.

use std::net::Ipv4Addr;

/// Index of an interface within a single [`crate::route::InterfaceTable`].
pub type InterfaceIndex = u8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub mac: [u8; 6],
    pub ip: Ipv4Addr,
}

/// The set of interfaces belonging to one router, indexed by the `iface_id`
/// the shim assigns in its `Interface` (type 4) configuration messages.
#[derive(Debug, Clone, Default)]
pub struct InterfaceTable {
    interfaces: Vec<Interface>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self { interfaces: Vec::new() }
    }

    /// Inserts an interface at the given index, growing the backing vector
    /// with placeholder entries if the shim sends indices out of order.
    /// Placeholders must all be overwritten before [`InterfaceTable::get`]
    /// is relied upon; `router-proto` guarantees this by the time
    /// `EndConfig` is reached.
    pub fn insert(&mut self, index: InterfaceIndex, iface: Interface) {
        let idx = index as usize;
        if idx >= self.interfaces.len() {
            self.interfaces.resize(
                idx + 1,
                Interface { name: String::new(), mac: [0; 6], ip: Ipv4Addr::UNSPECIFIED },
            );
        }
        self.interfaces[idx] = iface;
    }

    pub fn get(&self, index: InterfaceIndex) -> Option<&Interface> {
        self.interfaces.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InterfaceIndex, &Interface)> {
        self.interfaces.iter().enumerate().map(|(i, iface)| (i as InterfaceIndex, iface))
    }

    /// The interface whose IP equals `ip`, if any.
    pub fn find_by_ip(&self, ip: Ipv4Addr) -> Option<InterfaceIndex> {
        self.interfaces
            .iter()
            .position(|iface| iface.ip == ip)
            .map(|i| i as InterfaceIndex)
    }
}
