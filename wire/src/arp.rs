//! ARP for IPv4 over Ethernet.

use crate::MacAddr;
use crate::error::WireError;
use crate::eth::ETHERTYPE_IPV4;
use crate::reader::Reader;
use std::net::Ipv4Addr;

pub const ARP_REQUEST: u16 = 1;
pub const ARP_REPLY: u16 = 2;

const HTYPE_ETHERNET: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpMessage {
    pub htype: u16,
    pub ptype: u16,
    pub hlen: u8,
    pub plen: u8,
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpMessage {
    pub const LEN: usize = 28;

    pub fn is_request(&self) -> bool {
        self.opcode == ARP_REQUEST
    }

    /// Answer this request as the owner of the requested address.
    pub fn reply_from(&self, our_mac: MacAddr) -> ArpMessage {
        ArpMessage {
            opcode: ARP_REPLY,
            sender_mac: our_mac,
            sender_ip: self.target_ip,
            target_mac: self.sender_mac,
            target_ip: self.sender_ip,
            ..*self
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut arp = [0u8; Self::LEN];
        arp[0..2].copy_from_slice(&self.htype.to_be_bytes());
        arp[2..4].copy_from_slice(&self.ptype.to_be_bytes());
        arp[4] = self.hlen;
        arp[5] = self.plen;
        arp[6..8].copy_from_slice(&self.opcode.to_be_bytes());
        arp[8..14].copy_from_slice(&self.sender_mac);
        arp[14..18].copy_from_slice(&self.sender_ip.octets());
        arp[18..24].copy_from_slice(&self.target_mac);
        arp[24..28].copy_from_slice(&self.target_ip.octets());
        arp
    }
}

/// Build an Ethernet/IPv4 ARP message.
pub fn make_arp(
    opcode: u16,
    sender_mac: &MacAddr,
    sender_ip: Ipv4Addr,
    target_mac: &MacAddr,
    target_ip: Ipv4Addr,
) -> [u8; ArpMessage::LEN] {
    ArpMessage {
        htype: HTYPE_ETHERNET,
        ptype: ETHERTYPE_IPV4,
        hlen: 6,
        plen: 4,
        opcode,
        sender_mac: *sender_mac,
        sender_ip,
        target_mac: *target_mac,
        target_ip,
    }
    .to_bytes()
}

pub fn parse_arp(buf: &[u8]) -> Result<ArpMessage, WireError> {
    let mut r = Reader::new("arp", buf);
    r.require(ArpMessage::LEN)?;
    let msg = ArpMessage {
        htype: r.u16()?,
        ptype: r.u16()?,
        hlen: r.u8()?,
        plen: r.u8()?,
        opcode: r.u16()?,
        sender_mac: r.mac()?,
        sender_ip: r.ipv4()?,
        target_mac: r.mac()?,
        target_ip: r.ipv4()?,
    };
    if msg.hlen != 6 || msg.plen != 4 {
        return Err(WireError::Unsupported {
            layer: "arp",
            field: "address length",
            value: (u32::from(msg.hlen) << 8) | u32::from(msg.plen),
        });
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smoltcp::wire::{ArpOperation, ArpPacket};

    const DEVICE_MAC: MacAddr = [0xc8, 0xa0, 0x30, 0x01, 0x02, 0x03];
    const OUR_MAC: MacAddr = [0x02, 0x54, 0x45, 0x54, 0x48, 0x01];

    #[test]
    fn test_roundtrip() {
        let bytes = make_arp(
            ARP_REQUEST,
            &DEVICE_MAC,
            Ipv4Addr::new(192, 168, 1, 3),
            &[0; 6],
            Ipv4Addr::new(192, 168, 1, 9),
        );
        let msg = parse_arp(&bytes).unwrap();
        assert!(msg.is_request());
        assert_eq!(msg.sender_mac, DEVICE_MAC);
        assert_eq!(msg.target_ip, Ipv4Addr::new(192, 168, 1, 9));
        assert_eq!(msg.to_bytes(), bytes);
    }

    #[test]
    fn test_reply_from() {
        let request = parse_arp(&make_arp(
            ARP_REQUEST,
            &DEVICE_MAC,
            Ipv4Addr::new(192, 168, 1, 3),
            &[0; 6],
            Ipv4Addr::new(192, 168, 1, 9),
        ))
        .unwrap();

        let reply = request.reply_from(OUR_MAC);
        assert_eq!(reply.opcode, ARP_REPLY);
        assert_eq!(reply.sender_mac, OUR_MAC);
        assert_eq!(reply.sender_ip, Ipv4Addr::new(192, 168, 1, 9));
        assert_eq!(reply.target_mac, DEVICE_MAC);
        assert_eq!(reply.target_ip, Ipv4Addr::new(192, 168, 1, 3));
    }

    #[test]
    fn test_decodes_with_smoltcp() {
        let bytes = make_arp(
            ARP_REPLY,
            &OUR_MAC,
            Ipv4Addr::new(10, 0, 0, 1),
            &DEVICE_MAC,
            Ipv4Addr::new(10, 0, 0, 2),
        );
        let pkt = ArpPacket::new_checked(&bytes[..]).unwrap();
        assert_eq!(pkt.operation(), ArpOperation::Reply);
        assert_eq!(pkt.source_hardware_addr(), &OUR_MAC);
        assert_eq!(pkt.source_protocol_addr(), &[10, 0, 0, 1]);
        assert_eq!(pkt.target_protocol_addr(), &[10, 0, 0, 2]);
    }

    #[test]
    fn test_rejects_foreign_address_lengths() {
        let mut bytes = make_arp(
            ARP_REQUEST,
            &DEVICE_MAC,
            Ipv4Addr::UNSPECIFIED,
            &[0; 6],
            Ipv4Addr::UNSPECIFIED,
        );
        bytes[4] = 8;
        assert!(matches!(parse_arp(&bytes), Err(WireError::Unsupported { .. })));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(parse_arp(&[0u8; 27]), Err(WireError::Truncated { .. })));
    }
}
