//! Types shared by the boot responder, the bridge, the USB transport and the
//! daemon.

mod device;
mod events;
mod link;

pub use device::*;
pub use events::*;
pub use link::*;
