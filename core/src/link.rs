//! The frame-transport boundary between sessions and the USB (or LAN) side.
//!
//! Inbound frames arrive on a bounded channel fed by a reader thread; outbound
//! frames go through a [`FrameSink`]. The reader keeps polling until its
//! [`PollHandle`] is stopped or dropped, so ending a session on any path also
//! ends the polling behind it.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::device::DeviceClass;

/// Depth of the inbound channel between a reader thread and its session.
pub const INBOUND_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("device disconnected")]
    Disconnected,

    #[error("transfer failed: {0}")]
    Transfer(String),
}

#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: Vec<u8>) -> Result<(), LinkError>;
}

pub type Inbound = mpsc::Receiver<Result<Vec<u8>, LinkError>>;
pub type InboundSender = mpsc::Sender<Result<Vec<u8>, LinkError>>;

/// Owner side of a reader's stop flag. Dropping it stops the reader.
#[derive(Debug)]
pub struct PollHandle {
    stop: Arc<AtomicBool>,
}

/// Reader side of a [`PollHandle`].
#[derive(Debug, Clone)]
pub struct PollFlag {
    stop: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn flag(&self) -> PollFlag {
        PollFlag {
            stop: self.stop.clone(),
        }
    }

    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            tracing::debug!("Polling stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Default for PollHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PollFlag {
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// An attached, claimed device ready to exchange Ethernet frames.
pub struct DeviceLink {
    pub class: DeviceClass,
    pub inbound: Inbound,
    pub outbound: Arc<dyn FrameSink>,
    pub poller: PollHandle,
}

impl DeviceLink {
    pub async fn recv(&mut self) -> Result<Vec<u8>, LinkError> {
        match self.inbound.recv().await {
            Some(frame) => frame,
            None => Err(LinkError::Disconnected),
        }
    }

    pub async fn send(&self, frame: Vec<u8>) -> Result<(), LinkError> {
        self.outbound.send(frame).await
    }

    pub fn stop_polling(&self) {
        self.poller.stop();
    }
}

/// A [`FrameSink`] that forwards frames into a channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: Vec<u8>) -> Result<(), LinkError> {
        self.tx.send(frame).map_err(|_| LinkError::Disconnected)
    }
}

/// The far end of a [`loopback`] link.
pub struct LoopbackPeer {
    pub to_host: InboundSender,
    pub from_host: mpsc::UnboundedReceiver<Vec<u8>>,
    pub poll: PollFlag,
}

impl LoopbackPeer {
    pub async fn inject(&self, frame: Vec<u8>) {
        let _ = self.to_host.send(Ok(frame)).await;
    }
}

/// An in-memory link, used to drive sessions without hardware.
pub fn loopback(class: DeviceClass) -> (DeviceLink, LoopbackPeer) {
    let (to_host, inbound) = mpsc::channel(INBOUND_DEPTH);
    let (out_tx, from_host) = mpsc::unbounded_channel();
    let poller = PollHandle::new();
    let poll = poller.flag();
    (
        DeviceLink {
            class,
            inbound,
            outbound: Arc::new(ChannelSink::new(out_tx)),
            poller,
        },
        LoopbackPeer {
            to_host,
            from_host,
            poll,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_stops_polling() {
        let handle = PollHandle::new();
        let flag = handle.flag();
        assert!(!flag.is_stopped());
        drop(handle);
        assert!(flag.is_stopped());
    }

    #[tokio::test]
    async fn test_loopback_roundtrip() {
        let (mut link, mut peer) = loopback(DeviceClass::Rom);
        peer.inject(vec![1, 2, 3]).await;
        assert_eq!(link.recv().await.unwrap(), vec![1, 2, 3]);

        link.send(vec![4, 5]).await.unwrap();
        assert_eq!(peer.from_host.recv().await.unwrap(), vec![4, 5]);

        link.stop_polling();
        assert!(peer.poll.is_stopped());
    }

    #[tokio::test]
    async fn test_closed_inbound_is_disconnect() {
        let (mut link, peer) = loopback(DeviceClass::Spl);
        drop(peer);
        assert_eq!(link.recv().await.unwrap_err(), LinkError::Disconnected);
    }
}
