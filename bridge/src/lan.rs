//! Promiscuous capture and raw injection on the host's LAN interface.

use std::sync::Arc;
use tether_core::{DeviceClass, FrameSink, Inbound, LinkError, LoopbackPeer, PollHandle};

use crate::error::BridgeError;

/// Frames captured on, and injected into, the LAN.
pub struct LanLink {
    pub inbound: Inbound,
    pub outbound: Arc<dyn FrameSink>,
    pub poller: PollHandle,
}

impl LanLink {
    pub async fn recv(&mut self) -> Result<Vec<u8>, LinkError> {
        match self.inbound.recv().await {
            Some(frame) => frame,
            None => Err(LinkError::Disconnected),
        }
    }

    pub async fn send(&self, frame: Vec<u8>) -> Result<(), LinkError> {
        self.outbound.send(frame).await
    }

    /// An in-memory LAN for driving the bridge without a real interface.
    pub fn loopback() -> (LanLink, LoopbackPeer) {
        let (link, peer) = tether_core::loopback(DeviceClass::LinuxComposite);
        (
            LanLink {
                inbound: link.inbound,
                outbound: link.outbound,
                poller: link.poller,
            },
            peer,
        )
    }
}

/// Open `interface` for capture and injection.
#[cfg(target_os = "linux")]
pub fn open_lan(interface: &str) -> Result<LanLink, BridgeError> {
    use tether_core::INBOUND_DEPTH;
    use tokio::sync::mpsc;

    let socket = Arc::new(raw::RawSocket::open(interface)?);
    let (tx, inbound) = mpsc::channel(INBOUND_DEPTH);
    let poller = PollHandle::new();
    let flag = poller.flag();

    let reader = socket.clone();
    let name = interface.to_string();
    std::thread::Builder::new()
        .name(format!("lan-{}", interface))
        .spawn(move || {
            let mut buf = vec![0u8; raw::CAPTURE_LEN];
            while !flag.is_stopped() {
                match reader.recv(&mut buf) {
                    Ok(Some(len)) => {
                        if tx.blocking_send(Ok(buf[..len].to_vec())).is_err() {
                            break;
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(interface = %name, error = %e, "LAN capture failed");
                        let _ = tx.blocking_send(Err(LinkError::Transfer(e.to_string())));
                        break;
                    }
                }
            }
            tracing::debug!(interface = %name, "LAN capture stopped");
        })?;

    tracing::info!(interface, "LAN capture started");
    Ok(LanLink {
        inbound,
        outbound: Arc::new(RawSink { socket }),
        poller,
    })
}

#[cfg(not(target_os = "linux"))]
pub fn open_lan(_interface: &str) -> Result<LanLink, BridgeError> {
    Err(BridgeError::Unsupported)
}

#[cfg(target_os = "linux")]
struct RawSink {
    socket: Arc<raw::RawSocket>,
}

#[cfg(target_os = "linux")]
#[async_trait::async_trait]
impl FrameSink for RawSink {
    async fn send(&self, frame: Vec<u8>) -> Result<(), LinkError> {
        self.socket
            .send(&frame)
            .map_err(|e| LinkError::Transfer(e.to_string()))
    }
}

#[cfg(target_os = "linux")]
mod raw {
    use std::ffi::CString;
    use std::io;
    use std::mem;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    /// Ethernet MTU plus header, with room for a VLAN tag.
    pub const CAPTURE_LEN: usize = 1536;

    /// How often a blocked reader wakes to check its stop flag.
    const READ_TIMEOUT_MS: libc::suseconds_t = 100_000;

    pub struct RawSocket {
        fd: OwnedFd,
        ifindex: libc::c_int,
    }

    impl RawSocket {
        pub fn open(interface: &str) -> io::Result<Self> {
            let name = CString::new(interface)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name"))?;
            let ifindex = unsafe { libc::if_nametoindex(name.as_ptr()) };
            if ifindex == 0 {
                return Err(io::Error::last_os_error());
            }
            let ifindex = ifindex as libc::c_int;
            let protocol = (libc::ETH_P_ALL as u16).to_be();

            let raw = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, protocol as i32) };
            let fd = match raw {
                -1 => return Err(io::Error::last_os_error()),
                fd => unsafe { OwnedFd::from_raw_fd(fd) },
            };

            let mut sa: libc::sockaddr_ll = unsafe { mem::zeroed() };
            sa.sll_family = libc::AF_PACKET as u16;
            sa.sll_protocol = protocol;
            sa.sll_ifindex = ifindex;
            let rc = unsafe {
                libc::bind(
                    fd.as_raw_fd(),
                    &sa as *const libc::sockaddr_ll as *const libc::sockaddr,
                    mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                )
            };
            if rc == -1 {
                return Err(io::Error::last_os_error());
            }

            // Membership ends when the socket closes, leaving the
            // interface's promiscuous flag as it was.
            let mreq = libc::packet_mreq {
                mr_ifindex: ifindex,
                mr_type: libc::PACKET_MR_PROMISC as libc::c_ushort,
                mr_alen: 0,
                mr_address: [0; 8],
            };
            setsockopt(&fd, libc::SOL_PACKET, libc::PACKET_ADD_MEMBERSHIP, &mreq)?;

            let timeout = libc::timeval {
                tv_sec: 0,
                tv_usec: READ_TIMEOUT_MS,
            };
            setsockopt(&fd, libc::SOL_SOCKET, libc::SO_RCVTIMEO, &timeout)?;

            Ok(Self { fd, ifindex })
        }

        /// Receive one frame. `None` on timeout and for frames this host sent.
        pub fn recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
            let mut sa: libc::sockaddr_ll = unsafe { mem::zeroed() };
            let mut sa_len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
            let n = unsafe {
                libc::recvfrom(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    0,
                    &mut sa as *mut libc::sockaddr_ll as *mut libc::sockaddr,
                    &mut sa_len,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                return match err.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
                    _ => Err(err),
                };
            }
            if sa.sll_pkttype == libc::PACKET_OUTGOING {
                return Ok(None);
            }
            Ok(Some(n as usize))
        }

        pub fn send(&self, frame: &[u8]) -> io::Result<()> {
            if frame.len() < 14 {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "short frame"));
            }
            let mut sa: libc::sockaddr_ll = unsafe { mem::zeroed() };
            sa.sll_family = libc::AF_PACKET as u16;
            sa.sll_ifindex = self.ifindex;
            sa.sll_halen = 6;
            sa.sll_addr[..6].copy_from_slice(&frame[..6]);
            let n = unsafe {
                libc::sendto(
                    self.fd.as_raw_fd(),
                    frame.as_ptr() as *const libc::c_void,
                    frame.len(),
                    0,
                    &sa as *const libc::sockaddr_ll as *const libc::sockaddr,
                    mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                )
            };
            if n < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }

    fn setsockopt<T>(
        fd: &OwnedFd,
        level: libc::c_int,
        name: libc::c_int,
        value: &T,
    ) -> io::Result<()> {
        let rc = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                level,
                name,
                value as *const T as *const libc::c_void,
                mem::size_of::<T>() as libc::socklen_t,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
