//! Device classes, resolved once per attach from the USB descriptor.

use std::fmt;
use std::time::Duration;
use tether_wire::Framing;

pub const TI_VID: u16 = 0x0451;
pub const ROM_PID: u16 = 0x6141;
pub const SPL_PID: u16 = 0xd022;
pub const LINUX_FOUNDATION_VID: u16 = 0x1d6b;
pub const LINUX_COMPOSITE_PID: u16 = 0x0104;

/// The SPL stage exposes two configurations; the same id with any other count
/// is U-Boot's mass-storage gadget.
const SPL_CONFIGURATIONS: u8 = 2;

const SPL_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// AM335x boot ROM asking for the first-stage loader.
    Rom,
    /// U-Boot SPL asking for the full U-Boot image.
    Spl,
    /// U-Boot exporting eMMC as USB mass storage. Recognised, not served.
    MassStorage,
    /// Booted Linux presenting a composite RNDIS/CDC gadget.
    LinuxComposite,
}

impl DeviceClass {
    pub fn identify(vid: u16, pid: u16, num_configurations: u8) -> Option<Self> {
        match (vid, pid) {
            (TI_VID, ROM_PID) => Some(DeviceClass::Rom),
            (TI_VID, SPL_PID) if num_configurations == SPL_CONFIGURATIONS => {
                Some(DeviceClass::Spl)
            }
            (TI_VID, SPL_PID) => Some(DeviceClass::MassStorage),
            (LINUX_FOUNDATION_VID, LINUX_COMPOSITE_PID) => Some(DeviceClass::LinuxComposite),
            _ => None,
        }
    }

    pub fn framing(self) -> Framing {
        match self {
            DeviceClass::Rom | DeviceClass::Spl => Framing::Rndis,
            DeviceClass::MassStorage | DeviceClass::LinuxComposite => Framing::Bare,
        }
    }

    /// Delay between attach and claiming interfaces.
    pub fn settle_delay(self) -> Duration {
        match self {
            DeviceClass::Spl => SPL_SETTLE_DELAY,
            _ => Duration::ZERO,
        }
    }

    pub fn is_bootloader(self) -> bool {
        matches!(self, DeviceClass::Rom | DeviceClass::Spl)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Rom => write!(f, "ROM"),
            DeviceClass::Spl => write!(f, "SPL"),
            DeviceClass::MassStorage => write!(f, "UMS"),
            DeviceClass::LinuxComposite => write!(f, "LINUX_COMPOSITE_DEVICE"),
        }
    }
}
