//! Whole USB transfers: fixed layer offsets, an optional RNDIS prefix, and a
//! builder that stacks headers back into a transfer.

use crate::error::WireError;
use crate::eth::{EthernetHeader, parse_ether};
use crate::ipv4::{Ipv4Header, parse_ipv4};
use crate::reader::Reader;
use crate::rndis::{RndisHeader, make_rndis};
use crate::udp::{UdpHeader, parse_udp};

pub const RNDIS_SIZE: usize = RndisHeader::LEN;
pub const ETHER_SIZE: usize = EthernetHeader::LEN;
pub const ARP_SIZE: usize = crate::arp::ArpMessage::LEN;
pub const IPV4_SIZE: usize = Ipv4Header::LEN;
pub const UDP_SIZE: usize = UdpHeader::LEN;
pub const BOOTP_SIZE: usize = crate::bootp::BootpMessage::LEN;
pub const TFTP_SIZE: usize = crate::tftp::HEADER_LEN;

/// RNDIS + Ethernet + IPv4 + UDP + BOOTP.
pub const FULL_SIZE: usize = RNDIS_SIZE + ETHER_SIZE + IPV4_SIZE + UDP_SIZE + BOOTP_SIZE;

/// Largest inbound bulk transfer we poll for.
pub const MAXBUF: usize = 500;

/// Whether the USB function wraps each Ethernet frame in an RNDIS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Rndis,
    Bare,
}

impl Framing {
    pub fn prefix_len(self) -> usize {
        match self {
            Framing::Rndis => RNDIS_SIZE,
            Framing::Bare => 0,
        }
    }
}

/// Read-only view of one received transfer.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    raw: &'a [u8],
    framing: Framing,
}

impl<'a> FrameView<'a> {
    pub fn new(raw: &'a [u8], framing: Framing) -> Self {
        Self { raw, framing }
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// The Ethernet frame, starting at its destination MAC.
    pub fn ethernet(&self) -> Result<&'a [u8], WireError> {
        slice_from("frame", self.raw, self.framing.prefix_len())
    }

    pub fn ether_header(&self) -> Result<EthernetHeader, WireError> {
        parse_ether(self.ethernet()?)
    }

    /// Everything after the Ethernet header (ARP message or IPv4 packet).
    pub fn network(&self) -> Result<&'a [u8], WireError> {
        slice_from("ethernet", self.ethernet()?, ETHER_SIZE)
    }

    pub fn ipv4_header(&self) -> Result<Ipv4Header, WireError> {
        parse_ipv4(self.network()?)
    }

    /// Everything after the IPv4 header, options skipped.
    pub fn transport(&self) -> Result<&'a [u8], WireError> {
        let ip = self.ipv4_header()?;
        slice_from("ipv4", self.network()?, ip.header_len())
    }

    pub fn udp_header(&self) -> Result<UdpHeader, WireError> {
        parse_udp(self.transport()?)
    }

    /// UDP payload, bounded by the UDP length field and by what was received.
    pub fn udp_payload(&self) -> Result<&'a [u8], WireError> {
        let udp = self.udp_header()?;
        let payload = slice_from("udp", self.transport()?, UDP_SIZE)?;
        Ok(&payload[..udp.payload_len().min(payload.len())])
    }
}

fn slice_from<'a>(
    layer: &'static str,
    buf: &'a [u8],
    offset: usize,
) -> Result<&'a [u8], WireError> {
    let mut r = Reader::new(layer, buf);
    r.skip(offset)?;
    Ok(r.rest())
}

/// Stacks protocol layers and prepends the framing prefix on `finish`.
#[derive(Debug)]
pub struct FrameBuilder {
    framing: Framing,
    body: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            body: Vec::with_capacity(FULL_SIZE),
        }
    }

    pub fn push(mut self, layer: &[u8]) -> Self {
        self.body.extend_from_slice(layer);
        self
    }

    /// Length of the Ethernet frame built so far.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        match self.framing {
            Framing::Bare => self.body,
            Framing::Rndis => {
                let mut out = Vec::with_capacity(RNDIS_SIZE + self.body.len());
                out.extend_from_slice(&make_rndis(self.body.len() as u32));
                out.extend_from_slice(&self.body);
                out
            }
        }
    }
}
