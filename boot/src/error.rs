use tether_core::{DeviceClass, LinkError};
use tether_wire::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("malformed frame: {0}")]
    Wire(#[from] WireError),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0} devices are not served by the boot responder")]
    NotBootloader(DeviceClass),

    #[error("no ARP peer resolved yet")]
    PeerUnresolved,

    #[error("no TFTP read request pending")]
    NoPendingRead,

    #[error("datagram of {0} bytes does not fit in an IPv4 packet")]
    Oversized(usize),

    #[error("device aborted transfer: error {code} ({message})")]
    Aborted { code: u16, message: String },
}
