//! UDP header. Replies leave the checksum at zero, which IPv4 permits.

use crate::error::WireError;
use crate::reader::Reader;

pub const PORT_BOOTPS: u16 = 67;
pub const PORT_BOOTPC: u16 = 68;
pub const PORT_TFTP: u16 = 69;
pub const PORT_MDNS: u16 = 5353;
pub const PORT_NETCONSOLE: u16 = 6666;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub len: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub const LEN: usize = 8;

    pub fn payload_len(&self) -> usize {
        (self.len as usize).saturating_sub(Self::LEN)
    }
}

/// Build a UDP header for `payload_len` bytes of data.
///
/// The length field saturates at `u16::MAX`; callers that carry the datagram
/// in IPv4 are already bounded below that by the packet's total length.
pub fn make_udp(payload_len: u16, src_port: u16, dst_port: u16) -> [u8; UdpHeader::LEN] {
    let len = payload_len.saturating_add(UdpHeader::LEN as u16);
    let mut hdr = [0u8; UdpHeader::LEN];
    hdr[0..2].copy_from_slice(&src_port.to_be_bytes());
    hdr[2..4].copy_from_slice(&dst_port.to_be_bytes());
    hdr[4..6].copy_from_slice(&len.to_be_bytes());
    hdr
}

pub fn parse_udp(buf: &[u8]) -> Result<UdpHeader, WireError> {
    let mut r = Reader::new("udp", buf);
    r.require(UdpHeader::LEN)?;
    Ok(UdpHeader {
        src_port: r.u16()?,
        dst_port: r.u16()?,
        len: r.u16()?,
        checksum: r.u16()?,
    })
}
