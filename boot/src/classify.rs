//! Sorting inbound transfers into the requests the responder understands.

use std::net::Ipv4Addr;
use tether_wire::arp::{ArpMessage, parse_arp};
use tether_wire::bootp::{BootpMessage, parse_bootp};
use tether_wire::eth::{ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_IPV6, EthernetHeader};
use tether_wire::ipv4::{IP_PROTO_IGMP, IP_PROTO_UDP};
use tether_wire::tftp::{TftpMessage, parse_tftp};
use tether_wire::udp::{PORT_BOOTPS, PORT_MDNS, PORT_NETCONSOLE, PORT_TFTP};
use tether_wire::{FrameView, Framing, WireError};

/// Addressing of a received UDP datagram, enough to answer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpOrigin {
    pub ether: EthernetHeader,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Arp {
        ether: EthernetHeader,
        arp: ArpMessage,
    },
    Bootp {
        origin: UdpOrigin,
        bootp: Box<BootpMessage>,
    },
    TftpRead {
        origin: UdpOrigin,
        filename: String,
    },
    TftpAck {
        block: u16,
    },
    TftpError {
        code: u16,
        message: String,
    },
    Netconsole(Vec<u8>),
    /// Traffic every booting stack emits (IPv6, IGMP, mDNS, ARP replies).
    Noise,
    Unidentified(String),
}

impl Request {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Arp { .. } => "arp",
            Request::Bootp { .. } => "bootp",
            Request::TftpRead { .. } => "tftp-read",
            Request::TftpAck { .. } => "tftp-ack",
            Request::TftpError { .. } => "tftp-error",
            Request::Netconsole(_) => "netconsole",
            Request::Noise => "noise",
            Request::Unidentified(_) => "unidentified",
        }
    }
}

pub fn classify(frame: &[u8], framing: Framing) -> Result<Request, WireError> {
    let view = FrameView::new(frame, framing);
    let ether = view.ether_header()?;

    match ether.ethertype {
        ETHERTYPE_ARP => {
            let arp = parse_arp(view.network()?)?;
            if arp.is_request() {
                Ok(Request::Arp { ether, arp })
            } else {
                Ok(Request::Noise)
            }
        }
        ETHERTYPE_IPV4 => classify_ipv4(&view, ether),
        ETHERTYPE_IPV6 => Ok(Request::Noise),
        other => Ok(Request::Unidentified(format!("ethertype {:#06x}", other))),
    }
}

fn classify_ipv4(view: &FrameView<'_>, ether: EthernetHeader) -> Result<Request, WireError> {
    let ip = view.ipv4_header()?;
    match ip.protocol {
        IP_PROTO_UDP => {}
        IP_PROTO_IGMP => return Ok(Request::Noise),
        other => return Ok(Request::Unidentified(format!("ip protocol {}", other))),
    }

    let udp = view.udp_header()?;
    let origin = UdpOrigin {
        ether,
        src_ip: ip.src,
        dst_ip: ip.dst,
        src_port: udp.src_port,
        dst_port: udp.dst_port,
    };
    let payload = view.udp_payload()?;

    match udp.dst_port {
        PORT_BOOTPS => {
            let bootp = parse_bootp(payload)?;
            if bootp.is_request() {
                Ok(Request::Bootp {
                    origin,
                    bootp: Box::new(bootp),
                })
            } else {
                Ok(Request::Noise)
            }
        }
        PORT_TFTP => match parse_tftp(payload)? {
            TftpMessage::ReadRequest { filename, .. } => Ok(Request::TftpRead { origin, filename }),
            TftpMessage::Ack { block } => Ok(Request::TftpAck { block }),
            TftpMessage::Error { code, message } => Ok(Request::TftpError { code, message }),
            other => Ok(Request::Unidentified(format!("tftp opcode {}", other.opcode()))),
        },
        PORT_NETCONSOLE => Ok(Request::Netconsole(payload.to_vec())),
        PORT_MDNS => Ok(Request::Noise),
        other => Ok(Request::Unidentified(format!("udp port {}", other))),
    }
}
