use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use tether_wire::MacAddr;

/// The host's identity on the real LAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub interface: String,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl HostInfo {
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) & u32::from(self.netmask))
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) | !u32::from(self.netmask))
    }

    pub fn on_subnet(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & u32::from(self.netmask) == u32::from(self.network())
    }
}

/// User-tunable bridge settings, loaded from the daemon's config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// LAN interface to borrow an address on. The default-route interface
    /// when unset.
    pub interface: Option<String>,
    /// Address the device is configured with on its USB segment.
    pub device_ip: Ipv4Addr,
    /// Address the device uses as its default gateway.
    pub device_gateway: Ipv4Addr,
    /// MAC the device sees for its gateway.
    pub gateway_mac: MacAddr,
    /// How long a candidate address must stay silent to be taken.
    pub probe_timeout_ms: u64,
    /// Candidates tried before giving up.
    pub probe_attempts: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            interface: None,
            device_ip: Ipv4Addr::new(192, 168, 6, 2),
            device_gateway: Ipv4Addr::new(192, 168, 6, 1),
            gateway_mac: [0x02, 0x54, 0x45, 0x54, 0x48, 0xfe],
            probe_timeout_ms: 1000,
            probe_attempts: 16,
        }
    }
}

impl BridgeSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// The fixed translation for one bridge session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub host: HostInfo,
    pub device_ip: Ipv4Addr,
    pub device_gateway: Ipv4Addr,
    pub gateway_mac: MacAddr,
    /// LAN address borrowed on the device's behalf.
    pub proxy_ip: Ipv4Addr,
}

impl BridgeConfig {
    pub fn new(host: HostInfo, settings: &BridgeSettings, proxy_ip: Ipv4Addr) -> Self {
        Self {
            host,
            device_ip: settings.device_ip,
            device_gateway: settings.device_gateway,
            gateway_mac: settings.gateway_mac,
            proxy_ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostInfo {
        HostInfo {
            interface: "eth0".into(),
            mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            ip: Ipv4Addr::new(10, 0, 0, 20),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
        }
    }

    #[test]
    fn test_subnet() {
        let host = host();
        assert_eq!(host.network(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(host.broadcast(), Ipv4Addr::new(10, 0, 0, 255));
        assert!(host.on_subnet(Ipv4Addr::new(10, 0, 0, 77)));
        assert!(!host.on_subnet(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn test_settings_defaults() {
        let settings: BridgeSettings =
            serde_json::from_str(r#"{"probe_timeout_ms": 250}"#).unwrap();
        assert_eq!(settings.probe_timeout(), Duration::from_millis(250));
        assert_eq!(settings.device_ip, Ipv4Addr::new(192, 168, 6, 2));
        assert!(settings.interface.is_none());
    }
}
