use std::net::Ipv4Addr;
use tether_wire::eth::{ETHERTYPE_IPV4, make_ether2};
use tether_wire::frame::{ETHER_SIZE, IPV4_SIZE, MAXBUF, UDP_SIZE};
use tether_wire::ipv4::{IP_PROTO_UDP, make_ipv4};
use tether_wire::udp::make_udp;
use tether_wire::{FrameBuilder, Framing, MacAddr};

use crate::classify::UdpOrigin;
use crate::error::SessionError;

/// Fixed addressing for a stream of UDP replies to one peer.
///
/// The Ethernet header never changes over a transfer, so it is built once.
#[derive(Debug, Clone)]
pub struct UdpRoute {
    framing: Framing,
    ether: [u8; 14],
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
}

impl UdpRoute {
    pub fn new(
        framing: Framing,
        src_mac: &MacAddr,
        dst_mac: &MacAddr,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Self {
        Self {
            framing,
            ether: make_ether2(dst_mac, src_mac, ETHERTYPE_IPV4),
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        }
    }

    /// Answer a datagram back along the path it came in on.
    pub fn reply_to(origin: &UdpOrigin, framing: Framing, our_mac: &MacAddr) -> Self {
        Self::new(
            framing,
            our_mac,
            &origin.ether.src,
            origin.dst_ip,
            origin.src_ip,
            origin.dst_port,
            origin.src_port,
        )
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    /// Largest payload whose frame still fits in one `MAXBUF` transfer.
    pub fn max_payload(&self) -> usize {
        MAXBUF - self.framing.prefix_len() - ETHER_SIZE - IPV4_SIZE - UDP_SIZE
    }

    pub fn frame(&self, payload: &[u8]) -> Result<Vec<u8>, SessionError> {
        self.frame_parts(&[payload])
    }

    /// Build a frame whose UDP payload is the concatenation of `parts`.
    pub fn frame_parts(&self, parts: &[&[u8]]) -> Result<Vec<u8>, SessionError> {
        let payload_len: usize = parts.iter().map(|p| p.len()).sum();
        let total_len = u16::try_from(IPV4_SIZE + UDP_SIZE + payload_len)
            .map_err(|_| SessionError::Oversized(payload_len))?;
        let udp_payload_len = total_len - (IPV4_SIZE + UDP_SIZE) as u16;

        let mut builder = FrameBuilder::new(self.framing)
            .push(&self.ether)
            .push(&make_ipv4(
                self.src_ip,
                self.dst_ip,
                IP_PROTO_UDP,
                0,
                total_len,
                0,
            ))
            .push(&make_udp(udp_payload_len, self.src_port, self.dst_port));
        for part in parts {
            builder = builder.push(part);
        }
        Ok(builder.finish())
    }
}
