//! Remote NDIS framing.
//!
//! ROM and SPL stages present an RNDIS function: every bulk transfer starts
//! with a `REMOTE_NDIS_PACKET_MSG` header ahead of the Ethernet frame, and on
//! hosts without an in-kernel RNDIS driver the link must be brought up with an
//! INITIALIZE and a SET over the control channel first. All fields are
//! little-endian.

use crate::error::WireError;
use crate::reader::Reader;

pub const RNDIS_PACKET_MSG: u32 = 0x0000_0001;
pub const RNDIS_INITIALIZE_MSG: u32 = 0x0000_0002;
pub const RNDIS_SET_MSG: u32 = 0x0000_0005;

pub const OID_GEN_CURRENT_PACKET_FILTER: u32 = 0x0001_010e;

/// Directed | all-multicast | broadcast | promiscuous.
pub const PACKET_FILTER: u32 = 0x0000_002d;

pub const INIT_LEN: usize = 24;
pub const SET_LEN: usize = 28;
/// SET message plus its four-byte information buffer.
pub const SET_MSG_LEN: usize = SET_LEN + 4;

const MAX_TRANSFER_SIZE: u32 = 1600;
const INIT_REQUEST_ID: u32 = 1;
const SET_REQUEST_ID: u32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RndisHeader {
    pub msg_type: u32,
    pub msg_len: u32,
    pub data_offset: u32,
    pub data_len: u32,
}

impl RndisHeader {
    pub const LEN: usize = 44;

    /// Offset of the payload from the start of the header.
    pub fn payload_offset(&self) -> usize {
        // DataOffset counts from the DataOffset field itself.
        8 + self.data_offset as usize
    }
}

struct LeWriter<const N: usize> {
    buf: [u8; N],
    pos: usize,
}

impl<const N: usize> LeWriter<N> {
    fn new() -> Self {
        Self {
            buf: [0u8; N],
            pos: 0,
        }
    }

    fn u32(mut self, v: u32) -> Self {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.pos += 4;
        self
    }

    fn finish(self) -> [u8; N] {
        self.buf
    }
}

/// Build the packet-message prefix for `payload_len` bytes of Ethernet frame.
pub fn make_rndis(payload_len: u32) -> [u8; RndisHeader::LEN] {
    LeWriter::new()
        .u32(RNDIS_PACKET_MSG)
        .u32(RndisHeader::LEN as u32 + payload_len)
        .u32(RndisHeader::LEN as u32 - 8)
        .u32(payload_len)
        // OOB data, per-packet info, VC handle and reserved stay zero.
        .finish()
}

pub fn make_rndis_init() -> [u8; INIT_LEN] {
    LeWriter::new()
        .u32(RNDIS_INITIALIZE_MSG)
        .u32(INIT_LEN as u32)
        .u32(INIT_REQUEST_ID)
        .u32(1) // major version
        .u32(0) // minor version
        .u32(MAX_TRANSFER_SIZE)
        .finish()
}

pub fn make_rndis_set() -> [u8; SET_MSG_LEN] {
    LeWriter::new()
        .u32(RNDIS_SET_MSG)
        .u32(SET_MSG_LEN as u32)
        .u32(SET_REQUEST_ID)
        .u32(OID_GEN_CURRENT_PACKET_FILTER)
        .u32(4) // information buffer length
        .u32(20) // information buffer offset, from request id
        .u32(0) // device VC handle
        .u32(PACKET_FILTER)
        .finish()
}

pub fn parse_rndis(buf: &[u8]) -> Result<RndisHeader, WireError> {
    let mut r = Reader::new("rndis", buf);
    r.require(RndisHeader::LEN)?;
    let hdr = RndisHeader {
        msg_type: r.u32_le()?,
        msg_len: r.u32_le()?,
        data_offset: r.u32_le()?,
        data_len: r.u32_le()?,
    };
    if hdr.msg_type != RNDIS_PACKET_MSG {
        return Err(WireError::Unsupported {
            layer: "rndis",
            field: "message type",
            value: hdr.msg_type,
        });
    }
    Ok(hdr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_header() {
        let bytes = make_rndis(342);
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        let hdr = parse_rndis(&bytes).unwrap();
        assert_eq!(hdr.msg_len, 386);
        assert_eq!(hdr.data_len, 342);
        assert_eq!(hdr.payload_offset(), RndisHeader::LEN);
        assert!(bytes[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_control_messages() {
        let init = make_rndis_init();
        assert_eq!(u32::from_le_bytes(init[0..4].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(init[4..8].try_into().unwrap()), 24);

        let set = make_rndis_set();
        assert_eq!(u32::from_le_bytes(set[4..8].try_into().unwrap()), 32);
        assert_eq!(
            u32::from_le_bytes(set[12..16].try_into().unwrap()),
            OID_GEN_CURRENT_PACKET_FILTER
        );
        assert_eq!(
            u32::from_le_bytes(set[28..32].try_into().unwrap()),
            PACKET_FILTER
        );
    }

    #[test]
    fn test_rejects_control_message_as_packet() {
        assert!(matches!(
            parse_rndis(&[make_rndis_init().as_slice(), &[0u8; 20]].concat()),
            Err(WireError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            parse_rndis(&[0u8; 43]),
            Err(WireError::Truncated { layer: "rndis", needed: 44, .. })
        ));
    }
}
