use std::collections::HashMap;
use std::net::Ipv4Addr;
use tether_wire::MacAddr;

/// LAN addresses learned from ARP traffic.
#[derive(Debug, Default, Clone)]
pub struct NeighborTable {
    entries: HashMap<Ipv4Addr, MacAddr>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `ip → mac`. Returns true when the entry is new or changed.
    pub fn learn(&mut self, ip: Ipv4Addr, mac: MacAddr) -> bool {
        if ip.is_unspecified() || mac == [0; 6] {
            return false;
        }
        self.entries.insert(ip, mac) != Some(mac)
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.entries.get(&ip).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
