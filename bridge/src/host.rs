//! The host's own LAN identity: default route, address, netmask and MAC.

use nix::ifaddrs::getifaddrs;
use std::net::Ipv4Addr;
use tether_wire::MacAddr;

use crate::config::HostInfo;
use crate::error::BridgeError;

const ROUTE_TABLE: &str = "/proc/net/route";

const RTF_UP: u32 = 0x0001;
const RTF_GATEWAY: u32 = 0x0002;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    pub interface: String,
    pub gateway: Ipv4Addr,
    pub metric: u32,
}

/// Default routes in a `/proc/net/route` table, lowest metric first.
pub fn parse_default_routes(table: &str) -> Vec<DefaultRoute> {
    let mut routes: Vec<DefaultRoute> = table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 8 {
                return None;
            }
            let destination = u32::from_str_radix(fields[1], 16).ok()?;
            let gateway = u32::from_str_radix(fields[2], 16).ok()?;
            let flags = u32::from_str_radix(fields[3], 16).ok()?;
            let metric = fields[6].parse().ok()?;
            let mask = u32::from_str_radix(fields[7], 16).ok()?;

            let gateway_up = flags & (RTF_UP | RTF_GATEWAY) == RTF_UP | RTF_GATEWAY;
            if destination != 0 || mask != 0 || !gateway_up {
                return None;
            }
            // The kernel prints addresses as native-endian words.
            Some(DefaultRoute {
                interface: fields[0].to_string(),
                gateway: Ipv4Addr::from(gateway.to_ne_bytes()),
                metric,
            })
        })
        .collect();
    routes.sort_by_key(|r| r.metric);
    routes
}

/// Identity of `interface`, or of the default-route interface when `None`.
pub fn host_info(interface: Option<&str>) -> Result<HostInfo, BridgeError> {
    let table = std::fs::read_to_string(ROUTE_TABLE)?;
    let routes = parse_default_routes(&table);
    let route = match interface {
        Some(name) => routes.iter().find(|r| r.interface == name),
        None => routes.first(),
    }
    .ok_or(BridgeError::NoDefaultRoute)?;

    let (ip, netmask, mac) = interface_addresses(&route.interface)?;
    let info = HostInfo {
        interface: route.interface.clone(),
        mac,
        ip,
        netmask,
        gateway: route.gateway,
    };
    tracing::info!(
        interface = %info.interface,
        ip = %info.ip,
        netmask = %info.netmask,
        gateway = %info.gateway,
        "Host network"
    );
    Ok(info)
}

fn interface_addresses(name: &str) -> Result<(Ipv4Addr, Ipv4Addr, MacAddr), BridgeError> {
    let mut ipv4 = None;
    let mut mac = None;

    for ifa in getifaddrs().map_err(std::io::Error::from)? {
        if ifa.interface_name != name {
            continue;
        }
        let Some(address) = ifa.address else {
            continue;
        };
        if let Some(sin) = address.as_sockaddr_in() {
            let netmask = ifa
                .netmask
                .as_ref()
                .and_then(|m| m.as_sockaddr_in())
                .map(|m| m.ip())
                .unwrap_or(Ipv4Addr::new(255, 255, 255, 0));
            ipv4.get_or_insert((sin.ip(), netmask));
        } else if let Some(link) = address.as_link_addr() {
            if let Some(hw) = link.addr() {
                mac = Some(hw);
            }
        }
    }

    match (ipv4, mac) {
        (Some((ip, netmask)), Some(mac)) => Ok((ip, netmask, mac)),
        _ => Err(BridgeError::InterfaceNotFound(name.to_string())),
    }
}
