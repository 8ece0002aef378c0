use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tether_core::DeviceClass;
use tether_wire::MacAddr;

/// Addressing and file names the responder hands out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// BOOTP `sname`.
    pub server_name: String,
    pub server_ip: Ipv4Addr,
    pub device_ip: Ipv4Addr,
    /// Hardware address the responder answers ARP with and sends from.
    pub server_mac: MacAddr,
    /// First-stage loader requested by the boot ROM.
    pub rom_image: String,
    /// Full image requested by SPL.
    pub spl_image: String,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            server_name: "BEAGLEBOOT".to_string(),
            server_ip: Ipv4Addr::new(192, 168, 1, 9),
            device_ip: Ipv4Addr::new(192, 168, 1, 3),
            server_mac: [0x02, 0x54, 0x45, 0x54, 0x48, 0x01],
            rom_image: "u-boot-spl.bin".to_string(),
            spl_image: "u-boot.img".to_string(),
        }
    }
}

impl BootConfig {
    pub fn boot_file(&self, class: DeviceClass) -> Option<&str> {
        match class {
            DeviceClass::Rom => Some(&self.rom_image),
            DeviceClass::Spl => Some(&self.spl_image),
            DeviceClass::MassStorage | DeviceClass::LinuxComposite => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_file_by_class() {
        let config = BootConfig::default();
        assert_eq!(config.boot_file(DeviceClass::Rom), Some("u-boot-spl.bin"));
        assert_eq!(config.boot_file(DeviceClass::Spl), Some("u-boot.img"));
        assert_eq!(config.boot_file(DeviceClass::LinuxComposite), None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BootConfig =
            serde_json::from_str(r#"{"spl_image": "u-boot-dtb.img"}"#).unwrap();
        assert_eq!(config.spl_image, "u-boot-dtb.img");
        assert_eq!(config.server_ip, Ipv4Addr::new(192, 168, 1, 9));
    }
}
