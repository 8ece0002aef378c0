//! Borrowing a free LAN address for the device and finding the gateway.

use std::net::Ipv4Addr;
use std::time::Duration;
use tether_wire::arp::{ARP_REQUEST, make_arp, parse_arp};
use tether_wire::eth::{BROADCAST_MAC, ETHERTYPE_ARP, make_ether2};
use tether_wire::{FrameView, Framing, MacAddr, format_mac};
use tokio::time::{Instant, timeout_at};

use crate::config::{BridgeConfig, BridgeSettings, HostInfo};
use crate::error::BridgeError;
use crate::lan::LanLink;
use crate::neighbors::NeighborTable;

/// Addresses on the host's subnet worth probing, starting just after the
/// host's own address and wrapping around.
pub fn candidates(host: &HostInfo) -> impl Iterator<Item = Ipv4Addr> + '_ {
    let network = u32::from(host.network());
    let broadcast = u32::from(host.broadcast());
    let start = u32::from(host.ip);
    let span = broadcast.saturating_sub(network);

    (1..=span)
        .map(move |offset| {
            let next = start.wrapping_add(offset);
            if next > broadcast {
                network + (next - broadcast)
            } else {
                next
            }
        })
        .map(Ipv4Addr::from)
        .filter(move |&ip| {
            let raw = u32::from(ip);
            raw != network && raw != broadcast && ip != host.ip && ip != host.gateway
        })
}

/// Send one ARP request and wait up to `wait` for `target` to answer.
///
/// With an unspecified `sender_ip` this is an address probe: another host
/// probing for the same address also counts as an answer.
pub async fn arp_exchange(
    lan: &mut LanLink,
    neighbors: &mut NeighborTable,
    host_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target: Ipv4Addr,
    wait: Duration,
) -> Result<Option<MacAddr>, BridgeError> {
    let mut request = make_ether2(&BROADCAST_MAC, &host_mac, ETHERTYPE_ARP).to_vec();
    request.extend_from_slice(&make_arp(ARP_REQUEST, &host_mac, sender_ip, &[0; 6], target));
    lan.send(request).await?;

    let deadline = Instant::now() + wait;
    loop {
        let frame = match timeout_at(deadline, lan.recv()).await {
            Ok(frame) => frame?,
            Err(_) => return Ok(None),
        };
        let view = FrameView::new(&frame, Framing::Bare);
        let Ok(ether) = view.ether_header() else {
            continue;
        };
        if ether.ethertype != ETHERTYPE_ARP || ether.src == host_mac {
            continue;
        }
        let Ok(arp) = view.network().and_then(parse_arp) else {
            continue;
        };
        neighbors.learn(arp.sender_ip, arp.sender_mac);

        if arp.sender_ip == target {
            return Ok(Some(arp.sender_mac));
        }
        if sender_ip.is_unspecified()
            && arp.is_request()
            && arp.sender_ip.is_unspecified()
            && arp.target_ip == target
        {
            return Ok(Some(arp.sender_mac));
        }
    }
}

/// Find a silent address for the device, then resolve the LAN gateway.
pub async fn establish(
    lan: &mut LanLink,
    host: HostInfo,
    settings: &BridgeSettings,
) -> Result<(BridgeConfig, NeighborTable), BridgeError> {
    let mut neighbors = NeighborTable::new();
    let wait = settings.probe_timeout();

    let mut proxy_ip = None;
    for candidate in candidates(&host).take(settings.probe_attempts) {
        if neighbors.lookup(candidate).is_some() {
            continue;
        }
        tracing::debug!(%candidate, "Probing address");
        match arp_exchange(
            lan,
            &mut neighbors,
            host.mac,
            Ipv4Addr::UNSPECIFIED,
            candidate,
            wait,
        )
        .await?
        {
            Some(mac) => tracing::debug!(%candidate, mac = %format_mac(&mac), "Address in use"),
            None => {
                proxy_ip = Some(candidate);
                break;
            }
        }
    }
    let proxy_ip = proxy_ip.ok_or_else(|| BridgeError::NoFreeAddress(host.interface.clone()))?;
    tracing::info!(%proxy_ip, interface = %host.interface, "Borrowed LAN address");

    if neighbors.lookup(host.gateway).is_none() {
        let mac = arp_exchange(lan, &mut neighbors, host.mac, proxy_ip, host.gateway, wait).await?;
        if mac.is_none() {
            return Err(BridgeError::GatewayUnresolved(host.gateway));
        }
    }

    Ok((BridgeConfig::new(host, settings, proxy_ip), neighbors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_wire::arp::ARP_REPLY;

    const HOST_MAC: MacAddr = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    const GW_MAC: MacAddr = [0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];

    fn host(ip: [u8; 4]) -> HostInfo {
        HostInfo {
            interface: "eth0".into(),
            mac: HOST_MAC,
            ip: Ipv4Addr::from(ip),
            netmask: Ipv4Addr::new(255, 255, 255, 248),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
        }
    }

    fn arp_reply(sender_mac: MacAddr, sender_ip: Ipv4Addr) -> Vec<u8> {
        let mut frame = make_ether2(&HOST_MAC, &sender_mac, ETHERTYPE_ARP).to_vec();
        frame.extend_from_slice(&make_arp(
            ARP_REPLY,
            &sender_mac,
            sender_ip,
            &HOST_MAC,
            Ipv4Addr::UNSPECIFIED,
        ));
        frame
    }

    #[test]
    fn test_candidates_wrap_and_skip() {
        let order: Vec<Ipv4Addr> = candidates(&host([10, 0, 0, 5])).collect();
        assert_eq!(
            order,
            vec![
                Ipv4Addr::new(10, 0, 0, 6),
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 3),
                Ipv4Addr::new(10, 0, 0, 4),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_establish_skips_taken_address() {
        let (mut lan, mut peer) = LanLink::loopback();
        let settings = BridgeSettings {
            probe_timeout_ms: 50,
            ..BridgeSettings::default()
        };

        let network = async {
            // First probe (10.0.0.6) is answered, the second goes unanswered.
            let probe = peer.from_host.recv().await.unwrap();
            let arp = parse_arp(&probe[14..]).unwrap();
            assert_eq!(arp.sender_ip, Ipv4Addr::UNSPECIFIED);
            assert_eq!(arp.target_ip, Ipv4Addr::new(10, 0, 0, 6));
            peer.inject(arp_reply([6; 6], arp.target_ip)).await;

            let probe = peer.from_host.recv().await.unwrap();
            assert_eq!(parse_arp(&probe[14..]).unwrap().target_ip, Ipv4Addr::new(10, 0, 0, 2));

            let gateway = peer.from_host.recv().await.unwrap();
            let arp = parse_arp(&gateway[14..]).unwrap();
            assert_eq!(arp.sender_ip, Ipv4Addr::new(10, 0, 0, 2));
            assert_eq!(arp.target_ip, Ipv4Addr::new(10, 0, 0, 1));
            peer.inject(arp_reply(GW_MAC, arp.target_ip)).await;
            peer
        };

        let (result, _peer) =
            tokio::join!(establish(&mut lan, host([10, 0, 0, 5]), &settings), network);
        let (config, neighbors) = result.unwrap();
        assert_eq!(config.proxy_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(neighbors.lookup(Ipv4Addr::new(10, 0, 0, 1)), Some(GW_MAC));
        assert_eq!(neighbors.lookup(Ipv4Addr::new(10, 0, 0, 6)), Some([6; 6]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_silent() {
        let (mut lan, _peer) = LanLink::loopback();
        let settings = BridgeSettings {
            probe_timeout_ms: 10,
            ..BridgeSettings::default()
        };
        let err = establish(&mut lan, host([10, 0, 0, 5]), &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::GatewayUnresolved(_)));
    }
}
