//! libusb transport for boot targets: bus watching, interface claiming and
//! bulk-endpoint frame links.

mod error;
mod link;
mod watcher;

pub use error::UsbError;
pub use link::{data_interface, open_link};
pub use watcher::{BusKey, BusState, SCAN_INTERVAL, UsbDevice, UsbEvent, UsbWatcher, scan};
