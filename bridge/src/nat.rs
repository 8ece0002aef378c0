//! Address translation between the device's USB segment and the LAN.
//!
//! Outbound, the device's address becomes the borrowed proxy address and its
//! MAC becomes the host's. Inbound, frames for the proxy address are handed
//! to the device as if they came from its gateway. ARP never crosses: each
//! side is answered locally.

use std::net::Ipv4Addr;
use tether_wire::arp::{ARP_REQUEST, ArpMessage, make_arp, parse_arp};
use tether_wire::checksum::{adjust_checksum, checksum, transport_checksum};
use tether_wire::eth::{BROADCAST_MAC, ETHERTYPE_ARP, ETHERTYPE_IPV4, make_ether2};
use tether_wire::ipv4::{IP_PROTO_ICMP, IP_PROTO_TCP, IP_PROTO_UDP, Ipv4Header, parse_ipv4};
use tether_wire::{FrameBuilder, FrameView, Framing, MacAddr, WireError, format_mac};

use crate::config::BridgeConfig;
use crate::neighbors::NeighborTable;

/// ICMP types that carry the header of the offending packet: destination
/// unreachable, source quench, redirect, time exceeded, parameter problem.
const ICMP_ERROR_TYPES: [u8; 5] = [3, 4, 5, 11, 12];
/// The quoted packet starts after type, code, checksum and four more bytes.
const ICMP_QUOTE_OFFSET: usize = 8;

/// Where a translated frame goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forward {
    /// Bare Ethernet frame for the LAN.
    Lan(Vec<u8>),
    /// Frame for the device, already carrying the device's framing.
    Device(Vec<u8>),
}

pub struct Translator {
    config: BridgeConfig,
    device_framing: Framing,
    device_mac: Option<MacAddr>,
    neighbors: NeighborTable,
}

impl Translator {
    pub fn new(config: BridgeConfig, neighbors: NeighborTable, device_framing: Framing) -> Self {
        Self {
            config,
            device_framing,
            device_mac: None,
            neighbors,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn device_mac(&self) -> Option<MacAddr> {
        self.device_mac
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// Translate a transfer received from the device.
    pub fn from_device(&mut self, raw: &[u8]) -> Result<Option<Forward>, WireError> {
        let view = FrameView::new(raw, self.device_framing);
        let ether = view.ether_header()?;

        match ether.ethertype {
            ETHERTYPE_ARP => {
                let arp = parse_arp(view.network()?)?;
                self.learn_device(ether.src);
                Ok(self.answer_device_arp(&arp))
            }
            ETHERTYPE_IPV4 => {
                let packet = view.network()?;
                let ip = parse_ipv4(packet)?;
                if ip.src != self.config.device_ip {
                    tracing::trace!(src = %ip.src, "Dropping device frame from foreign address");
                    return Ok(None);
                }
                self.learn_device(ether.src);
                self.outbound_ipv4(&ip, packet)
            }
            _ => Ok(None),
        }
    }

    /// Translate a frame captured on the LAN.
    pub fn from_lan(&mut self, frame: &[u8]) -> Result<Option<Forward>, WireError> {
        let view = FrameView::new(frame, Framing::Bare);
        let ether = view.ether_header()?;

        match ether.ethertype {
            ETHERTYPE_ARP => {
                let arp = parse_arp(view.network()?)?;
                if self.neighbors.learn(arp.sender_ip, arp.sender_mac) {
                    tracing::debug!(
                        ip = %arp.sender_ip,
                        mac = %format_mac(&arp.sender_mac),
                        "Learned LAN neighbor"
                    );
                }
                if arp.is_request() && arp.target_ip == self.config.proxy_ip {
                    let reply = arp.reply_from(self.config.host.mac);
                    let mut out = make_ether2(&arp.sender_mac, &self.config.host.mac, ETHERTYPE_ARP)
                        .to_vec();
                    out.extend_from_slice(&reply.to_bytes());
                    return Ok(Some(Forward::Lan(out)));
                }
                Ok(None)
            }
            ETHERTYPE_IPV4 => {
                let packet = view.network()?;
                let ip = parse_ipv4(packet)?;
                if ip.dst != self.config.proxy_ip || ether.dst != self.config.host.mac {
                    return Ok(None);
                }
                if ip.is_fragment() {
                    tracing::debug!(src = %ip.src, "Dropping inbound fragment");
                    return Ok(None);
                }
                let Some(device_mac) = self.device_mac else {
                    return Ok(None);
                };

                let mut packet = packet_bytes(&ip, packet)?;
                rewrite_ipv4(&mut packet, None, Some(self.config.device_ip))?;
                rewrite_icmp_quote(&mut packet, self.config.proxy_ip, self.config.device_ip)?;
                let out = FrameBuilder::new(self.device_framing)
                    .push(&make_ether2(&device_mac, &self.config.gateway_mac, ETHERTYPE_IPV4))
                    .push(&packet)
                    .finish();
                Ok(Some(Forward::Device(out)))
            }
            _ => Ok(None),
        }
    }

    /// Broadcast ARP request for `target`, sent with the proxy identity.
    pub fn arp_request(&self, target: Ipv4Addr) -> Vec<u8> {
        let mut out = make_ether2(&BROADCAST_MAC, &self.config.host.mac, ETHERTYPE_ARP).to_vec();
        out.extend_from_slice(&make_arp(
            ARP_REQUEST,
            &self.config.host.mac,
            self.config.proxy_ip,
            &[0; 6],
            target,
        ));
        out
    }

    fn learn_device(&mut self, mac: MacAddr) {
        if self.device_mac != Some(mac) {
            tracing::info!(mac = %format_mac(&mac), "Device MAC learned");
            self.device_mac = Some(mac);
        }
    }

    fn answer_device_arp(&self, arp: &ArpMessage) -> Option<Forward> {
        // Probes for its own address get no answer, anything else is us.
        if !arp.is_request() || arp.target_ip == self.config.device_ip {
            return None;
        }
        let reply = arp.reply_from(self.config.gateway_mac);
        let frame = FrameBuilder::new(self.device_framing)
            .push(&make_ether2(&arp.sender_mac, &self.config.gateway_mac, ETHERTYPE_ARP))
            .push(&reply.to_bytes())
            .finish();
        Some(Forward::Device(frame))
    }

    fn outbound_ipv4(
        &mut self,
        ip: &Ipv4Header,
        packet: &[u8],
    ) -> Result<Option<Forward>, WireError> {
        if ip.dst.is_broadcast() || ip.dst.is_multicast() || ip.dst == self.config.device_gateway {
            return Ok(None);
        }
        if ip.is_fragment() {
            tracing::debug!(dst = %ip.dst, "Dropping outbound fragment");
            return Ok(None);
        }

        let host = &self.config.host;
        let next_hop = if host.on_subnet(ip.dst) {
            ip.dst
        } else {
            host.gateway
        };
        let Some(next_mac) = self.neighbors.lookup(next_hop) else {
            tracing::debug!(%next_hop, "Next hop unresolved, sending ARP request");
            return Ok(Some(Forward::Lan(self.arp_request(next_hop))));
        };

        let mut packet = packet_bytes(ip, packet)?;
        rewrite_ipv4(&mut packet, Some(self.config.proxy_ip), None)?;
        rewrite_icmp_quote(&mut packet, self.config.device_ip, self.config.proxy_ip)?;
        let mut out = make_ether2(&next_mac, &host.mac, ETHERTYPE_IPV4).to_vec();
        out.extend_from_slice(&packet);
        Ok(Some(Forward::Lan(out)))
    }
}

/// The packet without any Ethernet padding after it.
fn packet_bytes(ip: &Ipv4Header, packet: &[u8]) -> Result<Vec<u8>, WireError> {
    Ok(packet[..packet_len(ip, packet.len())?].to_vec())
}

fn packet_len(ip: &Ipv4Header, available: usize) -> Result<usize, WireError> {
    let total = ip.total_len as usize;
    if total < ip.header_len() || total > available {
        return Err(WireError::Truncated {
            layer: "ipv4",
            needed: total.max(ip.header_len()),
            available,
        });
    }
    Ok(total)
}

/// Replace the source and/or destination of an IPv4 packet and fix up the
/// header checksum and, for TCP and UDP, the transport checksum.
pub fn rewrite_ipv4(
    packet: &mut [u8],
    src: Option<Ipv4Addr>,
    dst: Option<Ipv4Addr>,
) -> Result<(), WireError> {
    let ip = parse_ipv4(packet)?;
    let hl = ip.header_len();
    let total = packet_len(&ip, packet.len())?;

    if let Some(src) = src {
        packet[12..16].copy_from_slice(&src.octets());
    }
    if let Some(dst) = dst {
        packet[16..20].copy_from_slice(&dst.octets());
    }
    packet[10..12].copy_from_slice(&[0, 0]);
    let sum = checksum(&packet[..hl]);
    packet[10..12].copy_from_slice(&sum.to_be_bytes());

    let src = src.unwrap_or(ip.src);
    let dst = dst.unwrap_or(ip.dst);
    let segment = &mut packet[hl..total];
    let offset = match ip.protocol {
        IP_PROTO_TCP => 16,
        IP_PROTO_UDP => 6,
        _ => return Ok(()),
    };
    if segment.len() < offset + 2 {
        return Err(WireError::Truncated {
            layer: "transport",
            needed: offset + 2,
            available: segment.len(),
        });
    }
    // A zero UDP checksum means the sender disabled it.
    if ip.protocol == IP_PROTO_UDP && segment[offset..offset + 2] == [0, 0] {
        return Ok(());
    }

    segment[offset..offset + 2].copy_from_slice(&[0, 0]);
    let mut sum = transport_checksum(src, dst, ip.protocol, segment);
    if sum == 0 && ip.protocol == IP_PROTO_UDP {
        sum = 0xffff;
    }
    segment[offset..offset + 2].copy_from_slice(&sum.to_be_bytes());
    Ok(())
}

/// Replace `from` with `to` in the packet quoted by an ICMP error message,
/// then fix the quoted header checksum, the quoted TCP/UDP checksum when it
/// was captured, and the ICMP checksum. Other packets are left alone.
pub fn rewrite_icmp_quote(
    packet: &mut [u8],
    from: Ipv4Addr,
    to: Ipv4Addr,
) -> Result<(), WireError> {
    let ip = parse_ipv4(packet)?;
    if ip.protocol != IP_PROTO_ICMP {
        return Ok(());
    }
    let hl = ip.header_len();
    let total = packet_len(&ip, packet.len())?;
    let icmp = &mut packet[hl..total];
    if icmp.len() < ICMP_QUOTE_OFFSET || !ICMP_ERROR_TYPES.contains(&icmp[0]) {
        return Ok(());
    }

    let quote = &mut icmp[ICMP_QUOTE_OFFSET..];
    let inner = parse_ipv4(quote)?;
    let inner_hl = inner.header_len();
    if quote.len() < inner_hl {
        return Err(WireError::Truncated {
            layer: "icmp",
            needed: ICMP_QUOTE_OFFSET + inner_hl,
            available: ICMP_QUOTE_OFFSET + quote.len(),
        });
    }

    let mut replaced = 0;
    for field in [12..16, 16..20] {
        if quote[field.clone()] == from.octets() {
            quote[field].copy_from_slice(&to.octets());
            replaced += 1;
        }
    }
    if replaced == 0 {
        return Ok(());
    }
    quote[10..12].copy_from_slice(&[0, 0]);
    let sum = checksum(&quote[..inner_hl]);
    quote[10..12].copy_from_slice(&sum.to_be_bytes());

    // Often only the first eight transport bytes are quoted, so the
    // pseudo-header change is applied to the stored value.
    let offset = match inner.protocol {
        IP_PROTO_TCP => Some(16),
        IP_PROTO_UDP => Some(6),
        _ => None,
    };
    let field = offset.map(|o| inner_hl + o).filter(|f| quote.len() >= f + 2);
    if let Some(field) = field {
        let mut stored = u16::from_be_bytes([quote[field], quote[field + 1]]);
        if !(inner.protocol == IP_PROTO_UDP && stored == 0) {
            for _ in 0..replaced {
                stored = adjust_checksum(stored, &from.octets(), &to.octets());
            }
            quote[field..field + 2].copy_from_slice(&stored.to_be_bytes());
        }
    }

    icmp[2..4].copy_from_slice(&[0, 0]);
    let sum = checksum(icmp);
    icmp[2..4].copy_from_slice(&sum.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostInfo;
    use tether_wire::arp::ARP_REPLY;
    use tether_wire::checksum::verify_checksum;
    use tether_wire::eth::parse_ether;
    use tether_wire::ipv4::make_ipv4;

    const HOST_MAC: MacAddr = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    const GATEWAY_LAN_MAC: MacAddr = [0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];
    const DEVICE_MAC: MacAddr = [0x62, 0x3c, 0x11, 0x22, 0x33, 0x44];
    const SYNTH_MAC: MacAddr = [0x02, 0x54, 0x45, 0x54, 0x48, 0xfe];
    const HOST_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 20);
    const LAN_GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const PROXY_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 21);
    const DEVICE_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 6, 2);
    const REMOTE_IP: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

    fn translator() -> Translator {
        let config = BridgeConfig {
            host: HostInfo {
                interface: "eth0".into(),
                mac: HOST_MAC,
                ip: HOST_IP,
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: LAN_GATEWAY,
            },
            device_ip: DEVICE_IP,
            device_gateway: Ipv4Addr::new(192, 168, 6, 1),
            gateway_mac: SYNTH_MAC,
            proxy_ip: PROXY_IP,
        };
        let mut neighbors = NeighborTable::new();
        neighbors.learn(LAN_GATEWAY, GATEWAY_LAN_MAC);
        Translator::new(config, neighbors, Framing::Bare)
    }

    /// IPv4/UDP packet with a valid UDP checksum.
    fn udp_packet(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
        let udp_len = 8 + payload.len();
        let mut packet = make_ipv4(src, dst, IP_PROTO_UDP, 7, (20 + udp_len) as u16, 0).to_vec();
        packet.extend_from_slice(&40000u16.to_be_bytes());
        packet.extend_from_slice(&53u16.to_be_bytes());
        packet.extend_from_slice(&(udp_len as u16).to_be_bytes());
        packet.extend_from_slice(&[0, 0]);
        packet.extend_from_slice(payload);
        let sum = transport_checksum(src, dst, IP_PROTO_UDP, &packet[20..]);
        packet[26..28].copy_from_slice(&sum.to_be_bytes());
        packet
    }

    fn ether(dst: &MacAddr, src: &MacAddr, ethertype: u16, body: &[u8]) -> Vec<u8> {
        let mut frame = make_ether2(dst, src, ethertype).to_vec();
        frame.extend_from_slice(body);
        frame
    }

    fn assert_checksums(packet: &[u8]) {
        let ip = parse_ipv4(packet).unwrap();
        assert!(verify_checksum(&packet[..20]));
        let segment = &packet[20..ip.total_len as usize];
        assert_eq!(transport_checksum(ip.src, ip.dst, ip.protocol, segment), 0);
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_device_arp_answered_locally() {
        let mut t = translator();
        let request = make_arp(
            ARP_REQUEST,
            &DEVICE_MAC,
            DEVICE_IP,
            &[0; 6],
            Ipv4Addr::new(192, 168, 6, 1),
        );
        let frame = ether(&BROADCAST_MAC, &DEVICE_MAC, ETHERTYPE_ARP, &request);

        let Some(Forward::Device(reply)) = t.from_device(&frame).unwrap() else {
            panic!("expected a device reply");
        };
        let arp = parse_arp(&reply[14..]).unwrap();
        assert_eq!(arp.opcode, ARP_REPLY);
        assert_eq!(arp.sender_mac, SYNTH_MAC);
        assert_eq!(arp.target_mac, DEVICE_MAC);
        assert_eq!(t.device_mac(), Some(DEVICE_MAC));
    }

    #[test]
    fn test_outbound_rewrite() {
        let mut t = translator();
        let packet = udp_packet(DEVICE_IP, REMOTE_IP, b"query");
        let frame = ether(&SYNTH_MAC, &DEVICE_MAC, ETHERTYPE_IPV4, &packet);

        let Some(Forward::Lan(out)) = t.from_device(&frame).unwrap() else {
            panic!("expected a LAN frame");
        };
        let eth = parse_ether(&out).unwrap();
        assert_eq!(eth.dst, GATEWAY_LAN_MAC);
        assert_eq!(eth.src, HOST_MAC);
        let ip = parse_ipv4(&out[14..]).unwrap();
        assert_eq!((ip.src, ip.dst), (PROXY_IP, REMOTE_IP));
        assert_checksums(&out[14..]);
        assert!(!contains(&out, &DEVICE_IP.octets()));
        assert!(!contains(&out, &DEVICE_MAC));
    }

    #[test]
    fn test_unknown_neighbor_triggers_arp() {
        let mut t = translator();
        let peer = Ipv4Addr::new(10, 0, 0, 50);
        let frame = ether(
            &SYNTH_MAC,
            &DEVICE_MAC,
            ETHERTYPE_IPV4,
            &udp_packet(DEVICE_IP, peer, b"x"),
        );
        let Some(Forward::Lan(out)) = t.from_device(&frame).unwrap() else {
            panic!("expected an ARP request");
        };
        let arp = parse_arp(&out[14..]).unwrap();
        assert!(arp.is_request());
        assert_eq!((arp.sender_ip, arp.target_ip), (PROXY_IP, peer));

        let reply = make_arp(ARP_REPLY, &[9; 6], peer, &HOST_MAC, PROXY_IP);
        t.from_lan(&ether(&HOST_MAC, &[9; 6], ETHERTYPE_ARP, &reply))
            .unwrap();
        assert_eq!(t.neighbors().lookup(peer), Some([9; 6]));
    }

    #[test]
    fn test_roundtrip_reversible_without_leaks() {
        let mut t = translator();
        let outbound = udp_packet(DEVICE_IP, REMOTE_IP, b"ping");
        t.from_device(&ether(&SYNTH_MAC, &DEVICE_MAC, ETHERTYPE_IPV4, &outbound))
            .unwrap();

        let response = udp_packet(REMOTE_IP, PROXY_IP, b"pong");
        // Trailing Ethernet padding must not reach the device.
        let mut frame = ether(&HOST_MAC, &GATEWAY_LAN_MAC, ETHERTYPE_IPV4, &response);
        frame.extend_from_slice(&[0; 6]);

        let Some(Forward::Device(out)) = t.from_lan(&frame).unwrap() else {
            panic!("expected a device frame");
        };
        let eth = parse_ether(&out).unwrap();
        assert_eq!(eth.dst, DEVICE_MAC);
        assert_eq!(eth.src, SYNTH_MAC);
        let ip = parse_ipv4(&out[14..]).unwrap();
        assert_eq!((ip.src, ip.dst), (REMOTE_IP, DEVICE_IP));
        assert_eq!(out.len(), 14 + response.len());
        assert_checksums(&out[14..]);
        assert_eq!(&out[14 + 28..], b"pong");
        assert!(!contains(&out, &PROXY_IP.octets()));
        assert!(!contains(&out, &HOST_MAC));

        // Mapping the device's view back restores the LAN packet exactly.
        let mut back = out[14..].to_vec();
        rewrite_ipv4(&mut back, None, Some(PROXY_IP)).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_lan_arp_for_proxy() {
        let mut t = translator();
        let asker = Ipv4Addr::new(10, 0, 0, 9);
        let request = make_arp(ARP_REQUEST, &[7; 6], asker, &[0; 6], PROXY_IP);
        let Some(Forward::Lan(out)) = t
            .from_lan(&ether(&BROADCAST_MAC, &[7; 6], ETHERTYPE_ARP, &request))
            .unwrap()
        else {
            panic!("expected an ARP reply");
        };
        let arp = parse_arp(&out[14..]).unwrap();
        assert_eq!(arp.opcode, ARP_REPLY);
        assert_eq!((arp.sender_mac, arp.sender_ip), (HOST_MAC, PROXY_IP));
        assert_eq!(t.neighbors().lookup(asker), Some([7; 6]));

        let other = make_arp(ARP_REQUEST, &[7; 6], asker, &[0; 6], HOST_IP);
        assert_eq!(
            t.from_lan(&ether(&BROADCAST_MAC, &[7; 6], ETHERTYPE_ARP, &other))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_inbound_ignored_until_device_known() {
        let mut t = translator();
        let packet = udp_packet(REMOTE_IP, PROXY_IP, b"early");
        let frame = ether(&HOST_MAC, &GATEWAY_LAN_MAC, ETHERTYPE_IPV4, &packet);
        assert_eq!(t.from_lan(&frame).unwrap(), None);

        let for_host = udp_packet(REMOTE_IP, HOST_IP, b"host");
        let frame = ether(&HOST_MAC, &GATEWAY_LAN_MAC, ETHERTYPE_IPV4, &for_host);
        assert_eq!(t.from_lan(&frame).unwrap(), None);
    }

    #[test]
    fn test_zero_udp_checksum_kept() {
        let mut packet = udp_packet(DEVICE_IP, REMOTE_IP, b"abc");
        packet[26..28].copy_from_slice(&[0, 0]);
        rewrite_ipv4(&mut packet, Some(PROXY_IP), None).unwrap();
        assert_eq!(&packet[26..28], &[0, 0]);
        assert!(verify_checksum(&packet[..20]));
    }

    /// ICMP error from `src` to `dst` quoting the first 28 bytes of `offending`.
    fn icmp_error(src: Ipv4Addr, dst: Ipv4Addr, kind: u8, code: u8, offending: &[u8]) -> Vec<u8> {
        let quoted = &offending[..28];
        let total = (20 + 8 + quoted.len()) as u16;
        let mut packet = make_ipv4(src, dst, IP_PROTO_ICMP, 3, total, 0).to_vec();
        let mut icmp = vec![kind, code, 0, 0, 0, 0, 0, 0];
        icmp.extend_from_slice(quoted);
        let sum = checksum(&icmp);
        icmp[2..4].copy_from_slice(&sum.to_be_bytes());
        packet.extend_from_slice(&icmp);
        packet
    }

    #[test]
    fn test_icmp_error_quote_translated_both_ways() {
        let mut t = translator();
        let outbound = udp_packet(DEVICE_IP, REMOTE_IP, b"hello");
        let Some(Forward::Lan(sent)) = t
            .from_device(&ether(&SYNTH_MAC, &DEVICE_MAC, ETHERTYPE_IPV4, &outbound))
            .unwrap()
        else {
            panic!("expected a LAN frame");
        };

        // Port unreachable from the remote, quoting what it received.
        let unreachable = icmp_error(REMOTE_IP, PROXY_IP, 3, 3, &sent[14..]);
        let frame = ether(&HOST_MAC, &GATEWAY_LAN_MAC, ETHERTYPE_IPV4, &unreachable);
        let Some(Forward::Device(out)) = t.from_lan(&frame).unwrap() else {
            panic!("expected a device frame");
        };
        assert!(!contains(&out, &PROXY_IP.octets()));
        let icmp = &out[14 + 20..];
        assert!(verify_checksum(icmp));
        assert!(verify_checksum(&icmp[8..28]));
        // The device sees the quote of exactly what it sent.
        assert_eq!(&icmp[8..], &outbound[..28]);

        // Time exceeded from the device for LAN traffic is mapped the other way.
        let inbound = udp_packet(REMOTE_IP, DEVICE_IP, b"late");
        let exceeded = icmp_error(DEVICE_IP, REMOTE_IP, 11, 0, &inbound);
        let Some(Forward::Lan(out)) = t
            .from_device(&ether(&SYNTH_MAC, &DEVICE_MAC, ETHERTYPE_IPV4, &exceeded))
            .unwrap()
        else {
            panic!("expected a LAN frame");
        };
        assert!(!contains(&out, &DEVICE_IP.octets()));
        let icmp = &out[14 + 20..];
        assert!(verify_checksum(icmp));
        let quoted = parse_ipv4(&icmp[8..]).unwrap();
        assert_eq!((quoted.src, quoted.dst), (REMOTE_IP, PROXY_IP));
    }

    #[test]
    fn test_icmp_echo_left_alone() {
        let mut packet = make_ipv4(REMOTE_IP, PROXY_IP, IP_PROTO_ICMP, 1, 28, 0).to_vec();
        let mut echo = vec![0, 0, 0, 0, 0, 1, 0, 1];
        let sum = checksum(&echo);
        echo[2..4].copy_from_slice(&sum.to_be_bytes());
        packet.extend_from_slice(&echo);

        let before = packet.clone();
        rewrite_icmp_quote(&mut packet, PROXY_IP, DEVICE_IP).unwrap();
        assert_eq!(packet, before);
    }
}
