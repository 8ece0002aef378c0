//! Bounds-checked cursor over a received frame.
//!
//! Every parser in this crate reads through a [`Reader`], so a short or
//! truncated transfer surfaces as [`WireError::Truncated`] instead of a panic.

use crate::error::WireError;
use crate::MacAddr;
use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    layer: &'static str,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(layer: &'static str, buf: &'a [u8]) -> Self {
        Self { layer, buf, pos: 0 }
    }

    /// Fail early unless at least `len` bytes remain.
    pub fn require(&self, len: usize) -> Result<(), WireError> {
        if self.remaining() < len {
            return Err(self.truncated(len));
        }
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        self.require(len)?;
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), WireError> {
        self.take(len).map(|_| ())
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// RNDIS is the one little-endian layer we speak.
    pub fn u32_le(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn mac(&mut self) -> Result<MacAddr, WireError> {
        self.array()
    }

    pub fn ipv4(&mut self) -> Result<Ipv4Addr, WireError> {
        Ok(Ipv4Addr::from(self.array::<4>()?))
    }

    /// Bytes up to (not including) the next NUL; the NUL itself is consumed.
    pub fn cstr(&mut self) -> Result<&'a [u8], WireError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::Unterminated(self.layer))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    fn truncated(&self, len: usize) -> WireError {
        WireError::Truncated {
            layer: self.layer,
            needed: self.pos + len,
            available: self.buf.len(),
        }
    }
}

/// Strip trailing NUL padding from a fixed-width field.
pub fn trim_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}
