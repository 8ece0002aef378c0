use std::net::Ipv4Addr;
use tether_core::LinkError;
use tether_wire::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("malformed frame: {0}")]
    Wire(#[from] WireError),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no free address found on {0}")]
    NoFreeAddress(String),

    #[error("no default route")]
    NoDefaultRoute,

    #[error("interface {0} not found or has no IPv4 address")]
    InterfaceNotFound(String),

    #[error("gateway {0} did not answer ARP")]
    GatewayUnresolved(Ipv4Addr),

    #[error("raw packet capture is not supported on this platform")]
    Unsupported,
}
