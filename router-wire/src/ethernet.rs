//! Ethernet II header: 14 bytes, dst MAC (6) + src MAC (6) + EtherType (2).

use crate::error::{require, WireError};

pub const HEADER_LEN: usize = 14;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const BROADCAST_MAC: [u8; 6] = [0xff; 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Parses the 14-byte Ethernet II header from the front of `frame`.
    ///
    /// Returns the header and the slice of `frame` following it (the
    /// payload, e.g. an ARP message or an IPv4 datagram).
    pub fn parse(frame: &[u8]) -> Result<(EthernetHeader, &[u8]), WireError> {
        require(frame.len(), HEADER_LEN)?;
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&frame[0..6]);
        src.copy_from_slice(&frame[6..12]);
        let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
        Ok((EthernetHeader { dst, src, ethertype }, &frame[HEADER_LEN..]))
    }

    /// Writes the 14-byte header into the front of `out`, returning the
    /// remainder of `out` for the caller to fill with the payload.
    pub fn build<'a>(&self, out: &'a mut [u8]) -> Result<&'a mut [u8], WireError> {
        require(out.len(), HEADER_LEN)?;
        out[0..6].copy_from_slice(&self.dst);
        out[6..12].copy_from_slice(&self.src);
        out[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
        Ok(&mut out[HEADER_LEN..])
    }

    pub fn is_broadcast(&self) -> bool {
        self.dst == BROADCAST_MAC
    }
}
