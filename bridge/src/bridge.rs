//! The pump between the device link and the LAN.

use tether_core::{DeviceLink, EventSender, SessionEvent};

use crate::error::BridgeError;
use crate::lan::LanLink;
use crate::nat::{Forward, Translator};

/// Pump frames both ways until either side goes away.
pub async fn run_bridge(
    mut translator: Translator,
    mut device: DeviceLink,
    mut lan: LanLink,
    events: &EventSender,
) -> Result<(), BridgeError> {
    let class = device.class;
    let config = translator.config();
    tracing::info!(
        %class,
        device_ip = %config.device_ip,
        proxy_ip = %config.proxy_ip,
        interface = %config.host.interface,
        "Bridge running"
    );
    let _ = events.send(SessionEvent::milestone(
        class,
        format!("bridging {} as {}", config.device_ip, config.proxy_ip),
    ));

    let result = loop {
        let forward = tokio::select! {
            frame = device.recv() => match frame {
                Ok(frame) => translator.from_device(&frame),
                Err(e) => break Err(BridgeError::from(e)),
            },
            frame = lan.recv() => match frame {
                Ok(frame) => translator.from_lan(&frame),
                Err(e) => break Err(BridgeError::from(e)),
            },
        };

        let sent = match forward {
            Ok(Some(Forward::Lan(frame))) => lan.send(frame).await,
            Ok(Some(Forward::Device(frame))) => device.send(frame).await,
            Ok(None) => Ok(()),
            Err(e) => {
                tracing::trace!(error = %e, "Dropping malformed frame");
                Ok(())
            }
        };
        if let Err(e) = sent {
            break Err(BridgeError::from(e));
        }
    };

    device.stop_polling();
    lan.poller.stop();
    if let Err(e) = &result {
        let _ = events.send(SessionEvent::error(class, e.to_string()));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, HostInfo};
    use crate::neighbors::NeighborTable;
    use std::net::Ipv4Addr;
    use tether_core::{DeviceClass, LinkError, loopback};
    use tether_wire::Framing;
    use tether_wire::eth::{ETHERTYPE_IPV4, make_ether2, parse_ether};
    use tether_wire::ipv4::{IP_PROTO_UDP, make_ipv4, parse_ipv4};
    use tokio::sync::mpsc;

    const HOST_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    const DEVICE_MAC: [u8; 6] = [0x62, 0x3c, 0x11, 0x22, 0x33, 0x44];

    fn translator() -> Translator {
        let config = BridgeConfig {
            host: HostInfo {
                interface: "eth0".into(),
                mac: HOST_MAC,
                ip: Ipv4Addr::new(10, 0, 0, 20),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(10, 0, 0, 1),
            },
            device_ip: Ipv4Addr::new(192, 168, 6, 2),
            device_gateway: Ipv4Addr::new(192, 168, 6, 1),
            gateway_mac: [0x02, 0x54, 0x45, 0x54, 0x48, 0xfe],
            proxy_ip: Ipv4Addr::new(10, 0, 0, 21),
        };
        let mut neighbors = NeighborTable::new();
        neighbors.learn(Ipv4Addr::new(10, 0, 0, 1), [0xaa; 6]);
        Translator::new(config, neighbors, Framing::Bare)
    }

    fn udp_frame(dst_mac: [u8; 6], src_mac: [u8; 6], src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        let mut frame = make_ether2(&dst_mac, &src_mac, ETHERTYPE_IPV4).to_vec();
        frame.extend_from_slice(&make_ipv4(src, dst, IP_PROTO_UDP, 1, 28, 0));
        frame.extend_from_slice(&[0x9c, 0x40, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);
        frame
    }

    #[tokio::test]
    async fn test_pumps_both_ways() {
        let (device, mut device_peer) = loopback(DeviceClass::LinuxComposite);
        let (lan, mut lan_peer) = LanLink::loopback();
        let (events, _event_rx) = mpsc::unbounded_channel();

        let remote = Ipv4Addr::new(1, 1, 1, 1);
        let traffic = async {
            device_peer
                .inject(udp_frame([0x02; 6], DEVICE_MAC, Ipv4Addr::new(192, 168, 6, 2), remote))
                .await;
            let out = lan_peer.from_host.recv().await.unwrap();
            assert_eq!(parse_ipv4(&out[14..]).unwrap().src, Ipv4Addr::new(10, 0, 0, 21));

            lan_peer
                .inject(udp_frame(HOST_MAC, [0xaa; 6], remote, Ipv4Addr::new(10, 0, 0, 21)))
                .await;
            let back = device_peer.from_host.recv().await.unwrap();
            assert_eq!(parse_ether(&back).unwrap().dst, DEVICE_MAC);
            assert_eq!(parse_ipv4(&back[14..]).unwrap().dst, Ipv4Addr::new(192, 168, 6, 2));

            drop(device_peer);
            lan_peer
        };

        let (result, lan_peer) =
            tokio::join!(run_bridge(translator(), device, lan, &events), traffic);
        assert!(matches!(
            result,
            Err(BridgeError::Link(LinkError::Disconnected))
        ));
        assert!(lan_peer.poll.is_stopped());
    }
}
