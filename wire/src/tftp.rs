//! TFTP (RFC 1350) messages.

use crate::error::WireError;
use crate::reader::Reader;

pub const TFTP_RRQ: u16 = 1;
pub const TFTP_WRQ: u16 = 2;
pub const TFTP_DATA: u16 = 3;
pub const TFTP_ACK: u16 = 4;
pub const TFTP_ERROR: u16 = 5;

pub const ERR_FILE_NOT_FOUND: u16 = 1;

/// Payload bytes carried by every DATA block except the last.
pub const BLOCK_SIZE: usize = 512;

pub const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TftpMessage {
    ReadRequest { filename: String, mode: String },
    WriteRequest { filename: String, mode: String },
    Data { block: u16, payload: Vec<u8> },
    Ack { block: u16 },
    Error { code: u16, message: String },
}

impl TftpMessage {
    pub fn opcode(&self) -> u16 {
        match self {
            TftpMessage::ReadRequest { .. } => TFTP_RRQ,
            TftpMessage::WriteRequest { .. } => TFTP_WRQ,
            TftpMessage::Data { .. } => TFTP_DATA,
            TftpMessage::Ack { .. } => TFTP_ACK,
            TftpMessage::Error { .. } => TFTP_ERROR,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TftpMessage::ReadRequest { filename, mode }
            | TftpMessage::WriteRequest { filename, mode } => {
                let mut out = Vec::with_capacity(4 + filename.len() + mode.len());
                out.extend_from_slice(&self.opcode().to_be_bytes());
                out.extend_from_slice(filename.as_bytes());
                out.push(0);
                out.extend_from_slice(mode.as_bytes());
                out.push(0);
                out
            }
            TftpMessage::Data { block, payload } => {
                let mut out = make_tftp(TFTP_DATA, *block).to_vec();
                out.extend_from_slice(payload);
                out
            }
            TftpMessage::Ack { block } => make_tftp(TFTP_ACK, *block).to_vec(),
            TftpMessage::Error { code, message } => make_tftp_error(*code, message),
        }
    }
}

/// Build the 4-byte DATA/ACK prefix: opcode followed by block number.
pub fn make_tftp(opcode: u16, block: u16) -> [u8; HEADER_LEN] {
    let mut hdr = [0u8; HEADER_LEN];
    hdr[0..2].copy_from_slice(&opcode.to_be_bytes());
    hdr[2..4].copy_from_slice(&block.to_be_bytes());
    hdr
}

/// Build an ERROR message: opcode, error code, NUL-terminated text.
pub fn make_tftp_error(code: u16, message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + message.len() + 1);
    out.extend_from_slice(&make_tftp(TFTP_ERROR, code));
    out.extend_from_slice(message.as_bytes());
    out.push(0);
    out
}

/// Peek at the opcode without decoding the rest of the message.
pub fn tftp_opcode(buf: &[u8]) -> Result<u16, WireError> {
    Reader::new("tftp", buf).u16()
}

pub fn parse_tftp(buf: &[u8]) -> Result<TftpMessage, WireError> {
    let mut r = Reader::new("tftp", buf);
    let opcode = r.u16()?;
    let msg = match opcode {
        TFTP_RRQ | TFTP_WRQ => {
            let filename = String::from_utf8_lossy(r.cstr()?).into_owned();
            // Some ROM clients omit the mode string entirely.
            let mode = r
                .cstr()
                .map(|m| String::from_utf8_lossy(m).into_owned())
                .unwrap_or_default();
            if opcode == TFTP_RRQ {
                TftpMessage::ReadRequest { filename, mode }
            } else {
                TftpMessage::WriteRequest { filename, mode }
            }
        }
        TFTP_DATA => TftpMessage::Data {
            block: r.u16()?,
            payload: r.rest().to_vec(),
        },
        TFTP_ACK => TftpMessage::Ack { block: r.u16()? },
        TFTP_ERROR => {
            let code = r.u16()?;
            let text = match r.cstr() {
                Ok(text) => text,
                Err(_) => r.rest(),
            };
            TftpMessage::Error {
                code,
                message: String::from_utf8_lossy(text).into_owned(),
            }
        }
        other => {
            return Err(WireError::Unsupported {
                layer: "tftp",
                field: "opcode",
                value: other as u32,
            });
        }
    };
    Ok(msg)
}
