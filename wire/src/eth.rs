//! Ethernet II header.

use crate::error::WireError;
use crate::reader::Reader;
use crate::MacAddr;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

pub const BROADCAST_MAC: MacAddr = [0xff; 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub const LEN: usize = 14;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        make_ether2(&self.dst, &self.src, self.ethertype)
    }
}

/// Build an Ethernet II header.
pub fn make_ether2(dst: &MacAddr, src: &MacAddr, ethertype: u16) -> [u8; EthernetHeader::LEN] {
    let mut hdr = [0u8; EthernetHeader::LEN];
    hdr[0..6].copy_from_slice(dst);
    hdr[6..12].copy_from_slice(src);
    hdr[12..14].copy_from_slice(&ethertype.to_be_bytes());
    hdr
}

pub fn parse_ether(buf: &[u8]) -> Result<EthernetHeader, WireError> {
    let mut r = Reader::new("ethernet", buf);
    r.require(EthernetHeader::LEN)?;
    Ok(EthernetHeader {
        dst: r.mac()?,
        src: r.mac()?,
        ethertype: r.u16()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use smoltcp::wire::{EthernetFrame, EthernetProtocol};

    const DEVICE: MacAddr = [0x02, 0x00, 0x00, 0x00, 0x00, 0x03];

    #[test]
    fn test_roundtrip() {
        let hdr = EthernetHeader {
            dst: DEVICE,
            src: BROADCAST_MAC,
            ethertype: ETHERTYPE_ARP,
        };
        assert_eq!(parse_ether(&hdr.to_bytes()).unwrap(), hdr);
    }

    #[test]
    fn test_decodes_with_smoltcp() {
        let bytes = make_ether2(&BROADCAST_MAC, &DEVICE, ETHERTYPE_IPV4);
        let frame = EthernetFrame::new_checked(&bytes[..]).unwrap();
        assert_eq!(frame.ethertype(), EthernetProtocol::Ipv4);
        assert_eq!(frame.src_addr().as_bytes(), &DEVICE);
        assert!(frame.dst_addr().is_broadcast());
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            parse_ether(&[0u8; 13]),
            Err(WireError::Truncated { needed: 14, .. })
        ));
    }
}
