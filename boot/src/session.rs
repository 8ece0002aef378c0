//! Per-device boot state machine.
//!
//! A `DeviceSession` never touches the transport or storage itself. `handle`
//! turns a classified request into an `Action`, and the caller performs it.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tether_core::DeviceClass;
use tether_wire::arp::ArpMessage;
use tether_wire::bootp::{BootpMessage, make_bootp};
use tether_wire::eth::{ETHERTYPE_ARP, EthernetHeader, make_ether2};
use tether_wire::tftp::{ERR_FILE_NOT_FOUND, make_tftp_error};
use tether_wire::udp::PORT_NETCONSOLE;
use tether_wire::{FrameBuilder, Framing, MacAddr};

use crate::classify::{Request, UdpOrigin};
use crate::config::BootConfig;
use crate::error::{SessionError, StorageError};
use crate::route::UdpRoute;
use crate::tftp::TftpTransfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Polling,
    ArpResolved,
    TftpActive,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

/// What the caller should do after a request was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(Vec<u8>),
    /// Load this file and pass the result to `begin_transfer`.
    Fetch(String),
    Console { bytes: Vec<u8>, started: bool },
    Complete,
    Ignore,
    Unidentified(String),
}

/// Outcome of starting a transfer once storage answered.
#[derive(Debug)]
pub enum Started {
    Sending(Vec<u8>),
    /// The file could not be read; `frame` carries the TFTP ERROR for the device.
    Refused { frame: Vec<u8>, error: StorageError },
}

/// The device end of the most recent ARP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPeer {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    /// The address the device asked about, which we now answer for.
    pub local_ip: Ipv4Addr,
}

#[derive(Debug)]
struct PendingRead {
    filename: String,
    route: UdpRoute,
}

#[derive(Debug)]
pub struct DeviceSession {
    class: DeviceClass,
    framing: Framing,
    config: Arc<BootConfig>,
    state: SessionState,
    arp_peer: Option<ArpPeer>,
    pending: Option<PendingRead>,
    transfer: Option<TftpTransfer>,
    console_started: bool,
}

impl DeviceSession {
    pub fn new(class: DeviceClass, config: Arc<BootConfig>) -> Result<Self, SessionError> {
        if !class.is_bootloader() {
            return Err(SessionError::NotBootloader(class));
        }
        Ok(Self {
            class,
            framing: class.framing(),
            config,
            state: SessionState::Idle,
            arp_peer: None,
            pending: None,
            transfer: None,
            console_started: false,
        })
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn arp_peer(&self) -> Option<&ArpPeer> {
        self.arp_peer.as_ref()
    }

    pub fn transfer(&self) -> Option<&TftpTransfer> {
        self.transfer.as_ref()
    }

    /// Mark the link as claimed and being polled.
    pub fn start(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Polling;
        }
    }

    pub fn handle(&mut self, request: Request) -> Result<Action, SessionError> {
        match request {
            Request::Arp { ether, arp } => Ok(self.on_arp(&ether, &arp)),
            Request::Bootp { origin, bootp } => self.on_bootp(&origin, &bootp),
            Request::TftpRead { origin, filename } => Ok(self.on_tftp_read(&origin, filename)),
            Request::TftpAck { block } => self.on_tftp_ack(block),
            Request::TftpError { code, message } => {
                tracing::warn!(class = %self.class, code, %message, "device aborted TFTP transfer");
                self.transfer = None;
                self.state = SessionState::Failed;
                Err(SessionError::Aborted { code, message })
            }
            Request::Netconsole(bytes) => {
                let started = !self.console_started;
                self.console_started = true;
                Ok(Action::Console { bytes, started })
            }
            Request::Noise => Ok(Action::Ignore),
            Request::Unidentified(what) => Ok(Action::Unidentified(what)),
        }
    }

    fn on_arp(&mut self, ether: &EthernetHeader, arp: &ArpMessage) -> Action {
        let reply = arp.reply_from(self.config.server_mac);
        let frame = FrameBuilder::new(self.framing)
            .push(&make_ether2(&ether.src, &self.config.server_mac, ETHERTYPE_ARP))
            .push(&reply.to_bytes())
            .finish();

        tracing::debug!(
            class = %self.class,
            sender = %arp.sender_ip,
            target = %arp.target_ip,
            "ARP request"
        );
        self.arp_peer = Some(ArpPeer {
            mac: arp.sender_mac,
            ip: arp.sender_ip,
            local_ip: arp.target_ip,
        });
        if !self.state.is_terminal() && self.state != SessionState::TftpActive {
            self.state = SessionState::ArpResolved;
        }
        Action::Reply(frame)
    }

    fn on_bootp(
        &mut self,
        origin: &UdpOrigin,
        bootp: &BootpMessage,
    ) -> Result<Action, SessionError> {
        let Some(boot_file) = self.config.boot_file(self.class) else {
            return Ok(Action::Ignore);
        };
        tracing::debug!(
            class = %self.class,
            xid = bootp.xid,
            file = boot_file,
            "BOOTP request"
        );

        let client_mac = bootp.client_mac();
        let payload = make_bootp(
            &self.config.server_name,
            boot_file,
            bootp.xid,
            &client_mac,
            self.config.device_ip,
            self.config.server_ip,
        );
        // The request comes from 0.0.0.0, so answer from the server address to
        // the address being offered.
        let route = UdpRoute::new(
            self.framing,
            &self.config.server_mac,
            &origin.ether.src,
            self.config.server_ip,
            self.config.device_ip,
            origin.dst_port,
            origin.src_port,
        );
        Ok(Action::Reply(route.frame(&payload)?))
    }

    fn on_tftp_read(&mut self, origin: &UdpOrigin, filename: String) -> Action {
        // A client that timed out starts over with a fresh read request.
        if let Some(old) = self.transfer.take() {
            tracing::info!(
                class = %self.class,
                file = old.filename(),
                sent = old.last_sent(),
                "TFTP transfer restarted by device"
            );
        }
        tracing::debug!(
            class = %self.class,
            %filename,
            port = origin.src_port,
            "TFTP read request"
        );
        self.pending = Some(PendingRead {
            filename: filename.clone(),
            route: UdpRoute::reply_to(origin, self.framing, &self.config.server_mac),
        });
        Action::Fetch(filename)
    }

    fn on_tftp_ack(&mut self, block: u16) -> Result<Action, SessionError> {
        let Some(transfer) = self.transfer.as_mut() else {
            return Ok(Action::Ignore);
        };

        let action = if transfer.is_current_ack(block) {
            match transfer.next_frame()? {
                Some(frame) => Action::Reply(frame),
                None => {
                    tracing::info!(
                        class = %self.class,
                        file = transfer.filename(),
                        bytes = transfer.len(),
                        "TFTP transfer complete"
                    );
                    self.transfer = None;
                    self.state = SessionState::Done;
                    Action::Complete
                }
            }
        } else if transfer.is_duplicate_ack(block) {
            tracing::debug!(class = %self.class, block, "duplicate ACK, resending");
            transfer.resend_frame()?.map_or(Action::Ignore, Action::Reply)
        } else {
            tracing::debug!(class = %self.class, block, "stale ACK ignored");
            Action::Ignore
        };
        Ok(action)
    }

    /// Feed the storage result for the pending read request.
    pub fn begin_transfer(
        &mut self,
        contents: Result<Vec<u8>, StorageError>,
    ) -> Result<Started, SessionError> {
        let pending = self.pending.take().ok_or(SessionError::NoPendingRead)?;

        match contents {
            Ok(data) => {
                let mut transfer = TftpTransfer::new(pending.filename, data, pending.route);
                tracing::info!(
                    class = %self.class,
                    file = transfer.filename(),
                    bytes = transfer.len(),
                    blocks = transfer.block_count(),
                    "TFTP transfer starts"
                );
                let first = transfer.next_frame()?.ok_or(SessionError::NoPendingRead)?;
                self.transfer = Some(transfer);
                self.state = SessionState::TftpActive;
                Ok(Started::Sending(first))
            }
            Err(error) => {
                let frame = pending
                    .route
                    .frame(&make_tftp_error(ERR_FILE_NOT_FOUND, "File not found"))?;
                self.state = SessionState::Failed;
                Ok(Started::Refused { frame, error })
            }
        }
    }

    /// Wrap console text in netconsole datagrams for the resolved peer, split
    /// so that every frame fits in one bulk transfer.
    pub fn console_frames(&self, text: &str) -> Result<Vec<Vec<u8>>, SessionError> {
        let peer = self.arp_peer.ok_or(SessionError::PeerUnresolved)?;
        let route = UdpRoute::new(
            self.framing,
            &self.config.server_mac,
            &peer.mac,
            peer.local_ip,
            peer.ip,
            PORT_NETCONSOLE,
            PORT_NETCONSOLE,
        );
        text.as_bytes()
            .chunks(route.max_payload())
            .map(|chunk| route.frame(chunk))
            .collect()
    }
}
