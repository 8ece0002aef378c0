//! Gives a booted device outbound connectivity by masquerading it behind an
//! address borrowed on the host's LAN.

mod bridge;
mod config;
mod error;
mod host;
mod lan;
mod neighbors;
mod nat;
mod probe;

pub use bridge::run_bridge;
pub use config::{BridgeConfig, BridgeSettings, HostInfo};
pub use error::BridgeError;
pub use host::{DefaultRoute, host_info, parse_default_routes};
pub use lan::{LanLink, open_lan};
pub use nat::{Forward, Translator, rewrite_icmp_quote, rewrite_ipv4};
pub use neighbors::NeighborTable;
pub use probe::{arp_exchange, candidates, establish};
