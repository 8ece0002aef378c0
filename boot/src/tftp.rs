//! Receiver-driven TFTP read transfer.

use tether_wire::tftp::{BLOCK_SIZE, TFTP_DATA, make_tftp};

use crate::error::SessionError;
use crate::route::UdpRoute;

/// Progress through one file being sent to the device.
///
/// Block numbers start at 1. The block count is `(len + 1) / 512` rounded
/// up, so a file whose length is a multiple of 512 still ends in a short
/// block and the device sees end-of-file.
#[derive(Debug)]
pub struct TftpTransfer {
    filename: String,
    data: Vec<u8>,
    route: UdpRoute,
    /// Next block to send.
    next_block: usize,
    blocks: usize,
}

impl TftpTransfer {
    pub fn new(filename: impl Into<String>, data: Vec<u8>, route: UdpRoute) -> Self {
        let blocks = (data.len() + 1).div_ceil(BLOCK_SIZE);
        Self {
            filename: filename.into(),
            data,
            route,
            next_block: 1,
            blocks,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.blocks
    }

    /// Number of the last block handed out, 0 before the first.
    pub fn last_sent(&self) -> usize {
        self.next_block - 1
    }

    pub fn is_finished(&self) -> bool {
        self.next_block > self.blocks
    }

    /// Frame for the next block, advancing the cursor. `None` once every
    /// block has been sent.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        if self.is_finished() {
            return Ok(None);
        }
        let frame = self.block_frame(self.next_block)?;
        self.next_block += 1;
        Ok(Some(frame))
    }

    /// Frame for the most recently sent block, used when the device repeats
    /// its acknowledgement of the one before.
    pub fn resend_frame(&self) -> Result<Option<Vec<u8>>, SessionError> {
        match self.last_sent() {
            0 => Ok(None),
            block => self.block_frame(block).map(Some),
        }
    }

    /// Whether an ACK with wire number `ack` acknowledges the block before
    /// the last one sent.
    pub fn is_duplicate_ack(&self, ack: u16) -> bool {
        let last = self.last_sent();
        last >= 1 && ack == wire_block(last - 1)
    }

    /// Whether `ack` acknowledges the last block sent.
    pub fn is_current_ack(&self, ack: u16) -> bool {
        self.last_sent() >= 1 && ack == wire_block(self.last_sent())
    }

    fn block_payload(&self, block: usize) -> &[u8] {
        let start = ((block - 1) * BLOCK_SIZE).min(self.data.len());
        let end = (start + BLOCK_SIZE).min(self.data.len());
        &self.data[start..end]
    }

    fn block_frame(&self, block: usize) -> Result<Vec<u8>, SessionError> {
        let header = make_tftp(TFTP_DATA, wire_block(block));
        self.route.frame_parts(&[&header, self.block_payload(block)])
    }
}

/// Block numbers wrap at 16 bits on the wire.
fn wire_block(block: usize) -> u16 {
    (block & 0xffff) as u16
}
