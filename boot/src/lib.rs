//! BOOTP/ARP/TFTP responder for a bootloader on the other end of a USB link.

mod classify;
mod config;
mod error;
mod responder;
mod route;
mod session;
mod storage;
mod tftp;

pub use classify::{Request, UdpOrigin, classify};
pub use config::BootConfig;
pub use error::{SessionError, StorageError};
pub use responder::run_session;
pub use route::UdpRoute;
pub use session::{Action, ArpPeer, DeviceSession, SessionState, Started};
pub use storage::{BootStorage, DirStorage};
pub use tftp::TftpTransfer;
