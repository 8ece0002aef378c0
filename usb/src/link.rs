//! Claiming a device and moving Ethernet frames over its bulk endpoints.

use async_trait::async_trait;
use rusb::{ConfigDescriptor, DeviceHandle, Direction, GlobalContext, TransferType};
use std::sync::Arc;
use std::time::Duration;
use tether_core::{DeviceClass, DeviceLink, FrameSink, INBOUND_DEPTH, LinkError, PollHandle};
use tether_wire::Framing;
use tether_wire::frame::MAXBUF;
use tether_wire::rndis::{make_rndis_init, make_rndis_set};
use tokio::sync::mpsc;

use crate::error::UsbError;
use crate::watcher::UsbDevice;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Class request types for the RNDIS control channel on interface 0.
const REQUEST_TYPE_SEND: u8 = 0x21;
const REQUEST_TYPE_RECEIVE: u8 = 0xa1;
const SEND_ENCAPSULATED_COMMAND: u8 = 0x00;
const GET_ENCAPSULATED_RESPONSE: u8 = 0x01;
const CONTROL_BUFFER_SIZE: usize = 1025;

/// Bare Ethernet from the composite gadget can be a full 1514-byte frame.
/// Bulk reads must also be a multiple of the 512-byte packet size.
const BARE_BUFFER_SIZE: usize = 2048;

/// Interfaces the composite gadget exposes. All are claimed so the host's
/// own network drivers leave the device alone.
const COMPOSITE_INTERFACES: std::ops::RangeInclusive<u8> = 0..=5;

/// Interface and alternate setting carrying Ethernet frames.
pub fn data_interface(class: DeviceClass) -> (u8, u8) {
    match class {
        DeviceClass::LinuxComposite => (3, 1),
        _ => (1, 0),
    }
}

/// Size of the buffer each bulk IN read lands in.
fn inbound_buffer_len(class: DeviceClass) -> usize {
    match class.framing() {
        Framing::Rndis => MAXBUF,
        Framing::Bare => BARE_BUFFER_SIZE,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    Frame(usize),
    Idle,
    /// The transfer did not fit the buffer and was discarded.
    Dropped,
    Fatal(LinkError),
}

fn read_outcome(result: rusb::Result<usize>) -> ReadOutcome {
    match result {
        Ok(0) => ReadOutcome::Idle,
        Ok(len) => ReadOutcome::Frame(len),
        Err(rusb::Error::Timeout) | Err(rusb::Error::Interrupted) => ReadOutcome::Idle,
        Err(rusb::Error::Overflow) => ReadOutcome::Dropped,
        Err(rusb::Error::NoDevice) => ReadOutcome::Fatal(LinkError::Disconnected),
        Err(e) => ReadOutcome::Fatal(LinkError::Transfer(e.to_string())),
    }
}

/// Open and claim `device`, then start polling its bulk IN endpoint.
pub fn open_link(device: &UsbDevice) -> Result<DeviceLink, UsbError> {
    let class = device.class;
    if class == DeviceClass::MassStorage {
        return Err(UsbError::NoNetwork(class));
    }
    let (interface, alt_setting) = data_interface(class);

    let mut handle = device.device().open()?;
    if class == DeviceClass::LinuxComposite {
        for i in COMPOSITE_INTERFACES {
            claim(&mut handle, i)?;
        }
    } else {
        claim(&mut handle, interface)?;
    }
    tracing::info!(%class, interface, "Interface claimed");

    if class == DeviceClass::Rom && !cfg!(target_os = "linux") {
        claim(&mut handle, 0)?;
        rndis_bring_up(&handle);
    }
    if alt_setting != 0 {
        handle.set_alternate_setting(interface, alt_setting)?;
    }

    let config = device.device().active_config_descriptor()?;
    let (ep_in, ep_out) = bulk_endpoints(&config, interface, alt_setting)?;
    tracing::debug!(%class, ep_in, ep_out, "Bulk endpoints");

    let handle = Arc::new(handle);
    let (tx, inbound) = mpsc::channel(INBOUND_DEPTH);
    let poller = PollHandle::new();
    let flag = poller.flag();
    let reader = handle.clone();

    std::thread::Builder::new()
        .name(format!("usb-{}-{}", device.bus, device.address))
        .spawn(move || {
            let mut buf = vec![0u8; inbound_buffer_len(class)];
            while !flag.is_stopped() {
                match read_outcome(reader.read_bulk(ep_in, &mut buf, READ_TIMEOUT)) {
                    ReadOutcome::Frame(len) => {
                        if tx.blocking_send(Ok(buf[..len].to_vec())).is_err() {
                            break;
                        }
                    }
                    ReadOutcome::Idle => {}
                    ReadOutcome::Dropped => {
                        tracing::warn!(%class, max = buf.len(), "Oversized bulk transfer dropped");
                    }
                    ReadOutcome::Fatal(e) => {
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            }
            tracing::debug!(%class, "USB polling stopped");
        })?;

    Ok(DeviceLink {
        class,
        inbound,
        outbound: Arc::new(BulkSink {
            handle,
            endpoint: ep_out,
        }),
        poller,
    })
}

fn claim(handle: &mut DeviceHandle<GlobalContext>, interface: u8) -> Result<(), UsbError> {
    // Not every platform can report or detach kernel drivers.
    if let Ok(true) = handle.kernel_driver_active(interface) {
        handle.detach_kernel_driver(interface)?;
        tracing::debug!(interface, "Kernel driver detached");
    }
    handle.claim_interface(interface).map_err(|e| match e {
        rusb::Error::NotFound => UsbError::InterfaceMissing(interface),
        e => UsbError::Usb(e),
    })
}

/// Send RNDIS INITIALIZE and SET(packet filter) over the control channel.
/// Hosts without an RNDIS driver must do this before the ROM will talk.
/// Failures are logged only; the ROM usually proceeds regardless.
fn rndis_bring_up(handle: &DeviceHandle<GlobalContext>) {
    let init = make_rndis_init();
    let set = make_rndis_set();
    for (name, message) in [("INITIALIZE", &init[..]), ("SET", &set[..])] {
        let mut buf = [0u8; CONTROL_BUFFER_SIZE];
        buf[..message.len()].copy_from_slice(message);
        if let Err(e) = handle.write_control(
            REQUEST_TYPE_SEND,
            SEND_ENCAPSULATED_COMMAND,
            0,
            0,
            &buf,
            CONTROL_TIMEOUT,
        ) {
            tracing::debug!(message = name, error = %e, "RNDIS send failed");
        }

        let mut response = [0u8; CONTROL_BUFFER_SIZE];
        if let Err(e) = handle.read_control(
            REQUEST_TYPE_RECEIVE,
            GET_ENCAPSULATED_RESPONSE,
            0,
            0,
            &mut response,
            CONTROL_TIMEOUT,
        ) {
            tracing::warn!(message = name, error = %e, "RNDIS response failed");
        }
    }
}

fn bulk_endpoints(
    config: &ConfigDescriptor,
    interface: u8,
    alt_setting: u8,
) -> Result<(u8, u8), UsbError> {
    for iface in config.interfaces() {
        if iface.number() != interface {
            continue;
        }
        for descriptor in iface.descriptors() {
            if descriptor.setting_number() != alt_setting {
                continue;
            }

            let mut ep_in = None;
            let mut ep_out = None;
            for ep in descriptor.endpoint_descriptors() {
                if ep.transfer_type() != TransferType::Bulk {
                    continue;
                }
                match ep.direction() {
                    Direction::In => {
                        ep_in.get_or_insert(ep.address());
                    }
                    Direction::Out => {
                        ep_out.get_or_insert(ep.address());
                    }
                }
            }

            let ep_in = ep_in.ok_or(UsbError::EndpointMissing {
                interface,
                direction: "IN",
            })?;
            let ep_out = ep_out.ok_or(UsbError::EndpointMissing {
                interface,
                direction: "OUT",
            })?;
            return Ok((ep_in, ep_out));
        }
    }
    Err(UsbError::InterfaceMissing(interface))
}

struct BulkSink {
    handle: Arc<DeviceHandle<GlobalContext>>,
    endpoint: u8,
}

#[async_trait]
impl FrameSink for BulkSink {
    async fn send(&self, frame: Vec<u8>) -> Result<(), LinkError> {
        let handle = self.handle.clone();
        let endpoint = self.endpoint;
        let written = tokio::task::spawn_blocking(move || {
            handle.write_bulk(endpoint, &frame, WRITE_TIMEOUT)
        })
        .await
        .map_err(|e| LinkError::Transfer(e.to_string()))?;

        match written {
            Ok(_) => Ok(()),
            Err(rusb::Error::NoDevice) => Err(LinkError::Disconnected),
            Err(e) => Err(LinkError::Transfer(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_interface() {
        assert_eq!(data_interface(DeviceClass::Rom), (1, 0));
        assert_eq!(data_interface(DeviceClass::Spl), (1, 0));
        assert_eq!(data_interface(DeviceClass::LinuxComposite), (3, 1));
    }

    #[test]
    fn test_inbound_buffer_by_framing() {
        assert_eq!(inbound_buffer_len(DeviceClass::Rom), 500);
        assert_eq!(inbound_buffer_len(DeviceClass::Spl), 500);
        assert!(inbound_buffer_len(DeviceClass::LinuxComposite) >= 1514);
        assert_eq!(inbound_buffer_len(DeviceClass::LinuxComposite) % 512, 0);
    }

    #[test]
    fn test_overflow_is_not_fatal() {
        assert_eq!(read_outcome(Err(rusb::Error::Overflow)), ReadOutcome::Dropped);
        assert_eq!(read_outcome(Err(rusb::Error::Timeout)), ReadOutcome::Idle);
        assert_eq!(read_outcome(Ok(0)), ReadOutcome::Idle);
        assert_eq!(read_outcome(Ok(60)), ReadOutcome::Frame(60));
        assert_eq!(
            read_outcome(Err(rusb::Error::NoDevice)),
            ReadOutcome::Fatal(LinkError::Disconnected)
        );
        assert!(matches!(
            read_outcome(Err(rusb::Error::Pipe)),
            ReadOutcome::Fatal(LinkError::Transfer(_))
        ));
    }
}
