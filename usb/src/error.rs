use tether_core::DeviceClass;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UsbError {
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interface {0} not found")]
    InterfaceMissing(u8),

    #[error("interface {interface} has no bulk {direction} endpoint")]
    EndpointMissing {
        interface: u8,
        direction: &'static str,
    },

    #[error("{0} devices carry no network link")]
    NoNetwork(DeviceClass),
}
