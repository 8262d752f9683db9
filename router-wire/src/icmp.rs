//! ICMP (RFC 792) header plus the handful of message shapes the router
//! engine needs to build: Echo Request/Reply, Destination Unreachable,
//! Time Exceeded.

use crate::checksum::internet_checksum;
use crate::error::{require, WireError};

pub const HEADER_LEN: usize = 8;

pub const TYPE_ECHO_REPLY: u8 = 0;
pub const TYPE_DEST_UNREACHABLE: u8 = 3;
pub const TYPE_ECHO_REQUEST: u8 = 8;
pub const TYPE_TIME_EXCEEDED: u8 = 11;

pub const CODE_NET_UNREACHABLE: u8 = 0;
pub const CODE_HOST_UNREACHABLE: u8 = 1;
pub const CODE_PORT_UNREACHABLE: u8 = 3;
pub const CODE_TTL_EXCEEDED: u8 = 0;

/// How many bytes of the original datagram's payload (beyond its IP header)
/// an ICMP error message carries back to the sender.
pub const ERROR_PAYLOAD_TRAILING_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    /// The 4-byte "rest of header" field: identifier+sequence for
    /// Echo Request/Reply, zero/unused for error messages.
    pub rest_of_header: u32,
}

impl IcmpHeader {
    /// Parses an 8-byte ICMP header from the front of `buf`, returning the
    /// header and the payload that follows it.
    pub fn parse(buf: &[u8]) -> Result<(IcmpHeader, &[u8]), WireError> {
        require(buf.len(), HEADER_LEN)?;
        let header = IcmpHeader {
            icmp_type: buf[0],
            code: buf[1],
            checksum: u16::from_be_bytes([buf[2], buf[3]]),
            rest_of_header: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        };
        Ok((header, &buf[HEADER_LEN..]))
    }

    /// Writes `self` followed by `payload` into `out`, computing the ICMP
    /// checksum over header+payload with the checksum field zeroed first.
    pub fn build_with_payload(&self, out: &mut [u8], payload: &[u8]) -> Result<(), WireError> {
        require(out.len(), HEADER_LEN + payload.len())?;
        out[0] = self.icmp_type;
        out[1] = self.code;
        out[2..4].copy_from_slice(&[0, 0]);
        out[4..8].copy_from_slice(&self.rest_of_header.to_be_bytes());
        out[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
        let csum = internet_checksum(&out[..HEADER_LEN + payload.len()]);
        out[2..4].copy_from_slice(&csum.to_be_bytes());
        Ok(())
    }

    pub fn verify_checksum(buf: &[u8]) -> bool {
        !buf.is_empty() && internet_checksum(buf) == 0
    }
}

/// Builds the rest-of-header for an Echo Reply from an Echo Request:
/// identifier/sequence copied verbatim from the request.
pub fn echo_reply_header(request_rest_of_header: u32) -> IcmpHeader {
    IcmpHeader {
        icmp_type: TYPE_ECHO_REPLY,
        code: 0,
        checksum: 0,
        rest_of_header: request_rest_of_header,
    }
}

/// Builds an ICMP error header (Destination Unreachable or Time Exceeded).
/// The "unused" rest-of-header is always zero.
pub fn error_header(icmp_type: u8, code: u8) -> IcmpHeader {
    IcmpHeader { icmp_type, code, checksum: 0, rest_of_header: 0 }
}

/// Truncates `original_ip_datagram` to its IP header plus up to
/// [`ERROR_PAYLOAD_TRAILING_BYTES`] bytes of payload, for embedding in an
/// ICMP error. If the datagram's payload is shorter, the whole payload is
/// kept.
pub fn error_payload(original_ip_header_len: usize, original_ip_datagram: &[u8]) -> &[u8] {
    let keep = original_ip_header_len
        + ERROR_PAYLOAD_TRAILING_BYTES.min(original_ip_datagram.len().saturating_sub(original_ip_header_len));
    &original_ip_datagram[..keep.min(original_ip_datagram.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_reply_round_trip() {
        let req_hdr = IcmpHeader {
            icmp_type: TYPE_ECHO_REQUEST,
            code: 0,
            checksum: 0,
            rest_of_header: 0x0001_0007,
        };
        let payload = b"ping-payload";
        let mut buf = vec![0u8; HEADER_LEN + payload.len()];
        req_hdr.build_with_payload(&mut buf, payload).unwrap();
        assert!(IcmpHeader::verify_checksum(&buf));

        let reply_hdr = echo_reply_header(req_hdr.rest_of_header);
        let mut reply_buf = vec![0u8; HEADER_LEN + payload.len()];
        reply_hdr.build_with_payload(&mut reply_buf, payload).unwrap();
        assert!(IcmpHeader::verify_checksum(&reply_buf));

        let (parsed, parsed_payload) = IcmpHeader::parse(&reply_buf).unwrap();
        assert_eq!(parsed.icmp_type, TYPE_ECHO_REPLY);
        assert_eq!(parsed.rest_of_header, req_hdr.rest_of_header);
        assert_eq!(parsed_payload, payload);
    }

    #[test]
    fn error_payload_truncates_to_8_bytes() {
        let datagram: Vec<u8> = (0..40u8).collect();
        let truncated = error_payload(20, &datagram);
        assert_eq!(truncated.len(), 28);
    }

    #[test]
    fn error_payload_keeps_short_payload_whole() {
        let datagram: Vec<u8> = (0..24u8).collect();
        let truncated = error_payload(20, &datagram);
        assert_eq!(truncated.len(), 24);
    }

    #[test]
    fn error_header_has_zero_rest_of_header() {
        let hdr = error_header(TYPE_DEST_UNREACHABLE, CODE_HOST_UNREACHABLE);
        assert_eq!(hdr.rest_of_header, 0);
    }
}
