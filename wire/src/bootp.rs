//! BOOTP (RFC 951) with RFC 1497 vendor extensions.

use crate::MacAddr;
use crate::error::WireError;
use crate::reader::{Reader, trim_nul};
use std::net::Ipv4Addr;

pub const BOOTREQUEST: u8 = 1;
pub const BOOTREPLY: u8 = 2;

pub const SNAME_LEN: usize = 64;
pub const FILE_LEN: usize = 128;
pub const VEND_LEN: usize = 64;
pub const CHADDR_LEN: usize = 16;

const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const OPT_SUBNET_MASK: u8 = 1;
const OPT_ROUTER: u8 = 3;
const OPT_END: u8 = 255;

pub const SUBNET_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootpMessage {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; CHADDR_LEN],
    pub sname: [u8; SNAME_LEN],
    pub file: [u8; FILE_LEN],
    pub vend: [u8; VEND_LEN],
}

impl BootpMessage {
    pub const LEN: usize = 300;

    pub fn is_request(&self) -> bool {
        self.op == BOOTREQUEST
    }

    pub fn client_mac(&self) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.chaddr[..6]);
        mac
    }

    pub fn server_name(&self) -> &[u8] {
        trim_nul(&self.sname)
    }

    pub fn boot_file(&self) -> &[u8] {
        trim_nul(&self.file)
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.op;
        out[1] = self.htype;
        out[2] = self.hlen;
        out[3] = self.hops;
        out[4..8].copy_from_slice(&self.xid.to_be_bytes());
        out[8..10].copy_from_slice(&self.secs.to_be_bytes());
        out[10..12].copy_from_slice(&self.flags.to_be_bytes());
        out[12..16].copy_from_slice(&self.ciaddr.octets());
        out[16..20].copy_from_slice(&self.yiaddr.octets());
        out[20..24].copy_from_slice(&self.siaddr.octets());
        out[24..28].copy_from_slice(&self.giaddr.octets());
        out[28..44].copy_from_slice(&self.chaddr);
        out[44..108].copy_from_slice(&self.sname);
        out[108..236].copy_from_slice(&self.file);
        out[236..300].copy_from_slice(&self.vend);
        out
    }
}

/// Copy `src` into a fixed-width field, always leaving a terminating NUL.
fn padded<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut field = [0u8; N];
    let len = src.len().min(N - 1);
    field[..len].copy_from_slice(&src[..len]);
    field
}

fn reply_vendor_area(router: Ipv4Addr) -> [u8; VEND_LEN] {
    let mut vend = [0u8; VEND_LEN];
    vend[0..4].copy_from_slice(&MAGIC_COOKIE);
    vend[4] = OPT_SUBNET_MASK;
    vend[5] = 4;
    vend[6..10].copy_from_slice(&SUBNET_MASK.octets());
    vend[10] = OPT_ROUTER;
    vend[11] = 4;
    vend[12..16].copy_from_slice(&router.octets());
    vend[16] = OPT_END;
    vend
}

/// Build a BOOTREPLY offering `your_ip` and naming `boot_file` on `server_ip`.
pub fn make_bootp(
    server_name: &str,
    boot_file: &str,
    xid: u32,
    client_mac: &MacAddr,
    your_ip: Ipv4Addr,
    server_ip: Ipv4Addr,
) -> [u8; BootpMessage::LEN] {
    BootpMessage {
        op: BOOTREPLY,
        htype: 1,
        hlen: 6,
        hops: 0,
        xid,
        secs: 0,
        flags: 0,
        ciaddr: Ipv4Addr::UNSPECIFIED,
        yiaddr: your_ip,
        siaddr: server_ip,
        giaddr: Ipv4Addr::UNSPECIFIED,
        chaddr: padded(client_mac),
        sname: padded(server_name.as_bytes()),
        file: padded(boot_file.as_bytes()),
        vend: reply_vendor_area(server_ip),
    }
    .to_bytes()
}

pub fn parse_bootp(buf: &[u8]) -> Result<BootpMessage, WireError> {
    let mut r = Reader::new("bootp", buf);
    r.require(BootpMessage::LEN)?;
    Ok(BootpMessage {
        op: r.u8()?,
        htype: r.u8()?,
        hlen: r.u8()?,
        hops: r.u8()?,
        xid: r.u32()?,
        secs: r.u16()?,
        flags: r.u16()?,
        ciaddr: r.ipv4()?,
        yiaddr: r.ipv4()?,
        siaddr: r.ipv4()?,
        giaddr: r.ipv4()?,
        chaddr: r.array()?,
        sname: r.array()?,
        file: r.array()?,
        vend: r.array()?,
    })
}
