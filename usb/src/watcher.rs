//! Bus scanning: turns enumeration snapshots into attach/detach events.

use rusb::{Device, GlobalContext, UsbContext};
use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::Duration;
use tether_core::{DeviceClass, PollHandle};
use tokio::sync::mpsc;

use crate::error::UsbError;

/// Bus number and device address.
pub type BusKey = (u8, u8);

pub const SCAN_INTERVAL: Duration = Duration::from_millis(250);

/// A recognised device, as seen on the bus.
#[derive(Debug, Clone)]
pub struct UsbDevice {
    pub bus: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub class: DeviceClass,
    device: Device<GlobalContext>,
}

impl UsbDevice {
    pub fn key(&self) -> BusKey {
        (self.bus, self.address)
    }

    pub fn device(&self) -> &Device<GlobalContext> {
        &self.device
    }
}

#[derive(Debug)]
pub enum UsbEvent {
    Attached(UsbDevice),
    Detached {
        bus: u8,
        address: u8,
        class: DeviceClass,
    },
}

/// Devices known from the previous scan.
#[derive(Debug, Default)]
pub struct BusState {
    known: HashMap<BusKey, DeviceClass>,
}

impl BusState {
    /// Compare a fresh scan against the last one. Returns the newly attached
    /// keys and the detached keys with their classes.
    pub fn update(
        &mut self,
        seen: &HashMap<BusKey, DeviceClass>,
    ) -> (Vec<BusKey>, Vec<(BusKey, DeviceClass)>) {
        let mut attached: Vec<BusKey> = seen
            .keys()
            .filter(|key| !self.known.contains_key(*key))
            .copied()
            .collect();
        let mut detached: Vec<(BusKey, DeviceClass)> = self
            .known
            .iter()
            .filter(|(key, class)| seen.get(*key) != Some(*class))
            .map(|(key, class)| (*key, *class))
            .collect();
        // A re-used address with a different class is a detach and an attach.
        for (key, _) in &detached {
            if seen.contains_key(key) && !attached.contains(key) {
                attached.push(*key);
            }
        }
        attached.sort_unstable();
        detached.sort_unstable_by_key(|(key, _)| *key);
        self.known = seen.clone();
        (attached, detached)
    }
}

/// Enumerate recognised devices currently on the bus.
pub fn scan() -> Result<HashMap<BusKey, UsbDevice>, UsbError> {
    let mut found = HashMap::new();
    for device in GlobalContext::default().devices()?.iter() {
        let Ok(desc) = device.device_descriptor() else {
            continue;
        };
        let Some(class) =
            DeviceClass::identify(desc.vendor_id(), desc.product_id(), desc.num_configurations())
        else {
            continue;
        };
        let usb = UsbDevice {
            bus: device.bus_number(),
            address: device.address(),
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            class,
            device,
        };
        found.insert(usb.key(), usb);
    }
    Ok(found)
}

/// Background thread that rescans the bus and reports changes.
pub struct UsbWatcher {
    poller: PollHandle,
    thread: Option<JoinHandle<()>>,
}

impl UsbWatcher {
    pub fn start(
        interval: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UsbEvent>), UsbError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = PollHandle::new();
        let flag = poller.flag();

        let thread = std::thread::Builder::new()
            .name("usb-watcher".to_string())
            .spawn(move || {
                let mut state = BusState::default();
                while !flag.is_stopped() {
                    match scan() {
                        Ok(mut devices) => {
                            let seen = devices.iter().map(|(k, d)| (*k, d.class)).collect();
                            let (attached, detached) = state.update(&seen);
                            for ((bus, address), class) in detached {
                                tracing::info!(bus, address, %class, "USB device detached");
                                if tx.send(UsbEvent::Detached { bus, address, class }).is_err() {
                                    return;
                                }
                            }
                            for key in attached {
                                let Some(device) = devices.remove(&key) else {
                                    continue;
                                };
                                tracing::info!(
                                    bus = device.bus,
                                    address = device.address,
                                    class = %device.class,
                                    vid = %format!("{:04x}", device.vendor_id),
                                    pid = %format!("{:04x}", device.product_id),
                                    "USB device attached"
                                );
                                if tx.send(UsbEvent::Attached(device)).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "USB scan failed"),
                    }
                    std::thread::sleep(interval);
                }
            })?;

        Ok((
            Self {
                poller,
                thread: Some(thread),
            },
            rx,
        ))
    }
}

impl Drop for UsbWatcher {
    fn drop(&mut self) {
        self.poller.stop();
        if let Some(h) = self.thread.take() {
            let _ = h.join();
        }
    }
}
