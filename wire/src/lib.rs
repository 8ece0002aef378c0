//! Encoders and decoders for the frames exchanged with a USB-attached boot
//! target: RNDIS, Ethernet, ARP, IPv4, UDP, BOOTP and TFTP.
//!
//! `make_*` functions return buffers of exact protocol length in network byte
//! order. `parse_*` functions read through a bounds-checked [`Reader`] and
//! fail with [`WireError::Truncated`] on short input.

mod error;

pub mod arp;
pub mod bootp;
pub mod checksum;
pub mod eth;
pub mod frame;
pub mod ipv4;
pub mod reader;
pub mod rndis;
pub mod tftp;
pub mod udp;

pub use error::WireError;
pub use frame::{FrameBuilder, FrameView, Framing};
pub use reader::Reader;

pub type MacAddr = [u8; 6];

/// Colon-separated lowercase hex, for log fields.
pub fn format_mac(mac: &MacAddr) -> String {
    mac.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}
