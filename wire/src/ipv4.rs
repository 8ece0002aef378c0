//! IPv4 header.

use crate::checksum::{checksum, verify_checksum};
use crate::error::WireError;
use crate::reader::Reader;
use std::net::Ipv4Addr;

pub const IP_PROTO_ICMP: u8 = 1;
pub const IP_PROTO_IGMP: u8 = 2;
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

pub const DEFAULT_TTL: u8 = 64;

/// Flags/fragment-offset word bits.
pub const FLAG_DONT_FRAGMENT: u16 = 0x4000;
pub const FLAG_MORE_FRAGMENTS: u16 = 0x2000;
const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub const LEN: usize = 20;

    pub fn header_len(&self) -> usize {
        (self.version_ihl & 0x0f) as usize * 4
    }

    pub fn payload_len(&self) -> usize {
        (self.total_len as usize).saturating_sub(self.header_len())
    }

    pub fn is_fragment(&self) -> bool {
        self.flags & FLAG_MORE_FRAGMENTS != 0 || self.flags & FRAGMENT_OFFSET_MASK != 0
    }
}

/// Build a 20-byte IPv4 header with a freshly computed checksum.
pub fn make_ipv4(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    protocol: u8,
    id: u16,
    total_len: u16,
    flags: u16,
) -> [u8; Ipv4Header::LEN] {
    let mut hdr = [0u8; Ipv4Header::LEN];
    hdr[0] = 0x45; // version + IHL
    hdr[1] = 0;
    hdr[2..4].copy_from_slice(&total_len.to_be_bytes());
    hdr[4..6].copy_from_slice(&id.to_be_bytes());
    hdr[6..8].copy_from_slice(&flags.to_be_bytes());
    hdr[8] = DEFAULT_TTL;
    hdr[9] = protocol;
    hdr[12..16].copy_from_slice(&src.octets());
    hdr[16..20].copy_from_slice(&dst.octets());

    let cksum = checksum(&hdr);
    hdr[10..12].copy_from_slice(&cksum.to_be_bytes());
    hdr
}

/// Decode the fixed part of an IPv4 header. Options, if any, are left to
/// the caller via [`Ipv4Header::header_len`].
pub fn parse_ipv4(buf: &[u8]) -> Result<Ipv4Header, WireError> {
    let mut r = Reader::new("ipv4", buf);
    r.require(Ipv4Header::LEN)?;
    let hdr = Ipv4Header {
        version_ihl: r.u8()?,
        tos: r.u8()?,
        total_len: r.u16()?,
        id: r.u16()?,
        flags: r.u16()?,
        ttl: r.u8()?,
        protocol: r.u8()?,
        checksum: r.u16()?,
        src: r.ipv4()?,
        dst: r.ipv4()?,
    };
    if hdr.version_ihl >> 4 != 4 || hdr.header_len() < Ipv4Header::LEN {
        return Err(WireError::Unsupported {
            layer: "ipv4",
            field: "version/ihl",
            value: hdr.version_ihl as u32,
        });
    }
    Ok(hdr)
}

/// Verify the checksum of the header at the start of `buf`, options included.
pub fn verify_ipv4(buf: &[u8]) -> Result<bool, WireError> {
    let hdr = parse_ipv4(buf)?;
    Reader::new("ipv4", buf).require(hdr.header_len())?;
    Ok(verify_checksum(&buf[..hdr.header_len()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smoltcp::wire::{IpProtocol, Ipv4Packet};

    const SERVER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 9);
    const DEVICE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 3);

    #[test]
    fn test_roundtrip() {
        let bytes = make_ipv4(SERVER, DEVICE, IP_PROTO_UDP, 7, 328, FLAG_DONT_FRAGMENT);
        let hdr = parse_ipv4(&bytes).unwrap();
        assert_eq!(hdr.src, SERVER);
        assert_eq!(hdr.dst, DEVICE);
        assert_eq!(hdr.protocol, IP_PROTO_UDP);
        assert_eq!(hdr.id, 7);
        assert_eq!(hdr.total_len, 328);
        assert_eq!(hdr.flags, FLAG_DONT_FRAGMENT);
        assert_eq!(hdr.ttl, DEFAULT_TTL);
        assert_eq!(hdr.header_len(), 20);
        assert_eq!(hdr.payload_len(), 308);
        assert!(!hdr.is_fragment());
    }

    #[test]
    fn test_checksum_verifies() {
        for (id, len) in [(0u16, 20u16), (1, 328), (0xffff, 1500), (0x1234, 576)] {
            let bytes = make_ipv4(SERVER, DEVICE, IP_PROTO_UDP, id, len, 0);
            assert!(verify_checksum(&bytes));
            assert!(verify_ipv4(&bytes).unwrap());
        }
    }

    #[test]
    fn test_decodes_with_smoltcp() {
        let mut packet = make_ipv4(SERVER, DEVICE, IP_PROTO_UDP, 0, 20, 0).to_vec();
        let pkt = Ipv4Packet::new_checked(&mut packet[..]).unwrap();
        assert!(pkt.verify_checksum());
        assert_eq!(pkt.next_header(), IpProtocol::Udp);
        assert_eq!(pkt.hop_limit(), 64);
        assert_eq!(pkt.total_len(), 20);
    }

    #[test]
    fn test_fragment_detection() {
        let hdr = parse_ipv4(&make_ipv4(SERVER, DEVICE, IP_PROTO_UDP, 0, 20, FLAG_MORE_FRAGMENTS))
            .unwrap();
        assert!(hdr.is_fragment());
        let hdr = parse_ipv4(&make_ipv4(SERVER, DEVICE, IP_PROTO_UDP, 0, 20, 0x0010)).unwrap();
        assert!(hdr.is_fragment());
    }

    #[test]
    fn test_rejects_non_ipv4() {
        let mut bytes = make_ipv4(SERVER, DEVICE, IP_PROTO_UDP, 0, 20, 0);
        bytes[0] = 0x60;
        assert!(matches!(parse_ipv4(&bytes), Err(WireError::Unsupported { .. })));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(parse_ipv4(&[0x45; 19]), Err(WireError::Truncated { .. })));
    }
}
