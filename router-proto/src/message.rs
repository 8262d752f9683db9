//! The shim's length-prefixed framed message set, byte-for-byte as
//! `original_source/src/python/chirouter/client.py`'s `ChirouterMessage`
//! subclasses pack/unpack them: a 4-byte `!BBH` header (type, subtype,
//! big-endian payload length) followed by the payload.

use crate::error::ProtoError;
use std::net::Ipv4Addr;

pub const TYPE_HELLO: u8 = 1;
pub const TYPE_ROUTERS: u8 = 2;
pub const TYPE_ROUTER: u8 = 3;
pub const TYPE_INTERFACE: u8 = 4;
pub const TYPE_ROUTE_ENTRY: u8 = 5;
pub const TYPE_END_CONFIG: u8 = 6;
pub const TYPE_ETHERNET_FRAME: u8 = 7;

const SUBTYPE_NONE: u8 = 0;
const SUBTYPE_TO_ROUTER: u8 = 1;
const SUBTYPE_FROM_ROUTER: u8 = 2;

/// Which side of the Hello/EthernetFrame exchange a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToRouter,
    FromRouter,
}

impl Direction {
    fn subtype(self) -> u8 {
        match self {
            Direction::ToRouter => SUBTYPE_TO_ROUTER,
            Direction::FromRouter => SUBTYPE_FROM_ROUTER,
        }
    }

    fn from_subtype(subtype: u8) -> Option<Direction> {
        match subtype {
            SUBTYPE_TO_ROUTER => Some(Direction::ToRouter),
            SUBTYPE_FROM_ROUTER => Some(Direction::FromRouter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Direction),
    Routers { num_routers: u8 },
    Router { rid: u8, num_interfaces: u8, len_rtable: u8, name: String },
    Interface { rid: u8, iface_id: u8, mac: [u8; 6], ip: Ipv4Addr, name: String },
    RouteEntry { rid: u8, iface_id: u8, metric: u16, dest: Ipv4Addr, mask: Ipv4Addr, gw: Ipv4Addr },
    EndConfig,
    EthernetFrame { rid: u8, iface_id: u8, direction: Direction, frame: Vec<u8> },
}

impl Message {
    /// Encodes this message to its full on-wire form: 4-byte header
    /// followed by the payload.
    pub fn encode(&self) -> Vec<u8> {
        let (msg_type, subtype, payload) = self.encode_parts();
        let mut out = Vec::with_capacity(4 + payload.len());
        out.push(msg_type);
        out.push(subtype);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&payload);
        out
    }

    fn encode_parts(&self) -> (u8, u8, Vec<u8>) {
        match self {
            Message::Hello(dir) => (TYPE_HELLO, dir.subtype(), Vec::new()),
            Message::Routers { num_routers } => (TYPE_ROUTERS, SUBTYPE_NONE, vec![*num_routers]),
            Message::Router { rid, num_interfaces, len_rtable, name } => {
                let mut payload = vec![*rid, *num_interfaces, *len_rtable];
                payload.extend_from_slice(name.as_bytes());
                (TYPE_ROUTER, SUBTYPE_NONE, payload)
            }
            Message::Interface { rid, iface_id, mac, ip, name } => {
                let mut payload = vec![*rid, *iface_id];
                payload.extend_from_slice(mac);
                payload.extend_from_slice(&ip.octets());
                payload.extend_from_slice(name.as_bytes());
                (TYPE_INTERFACE, SUBTYPE_NONE, payload)
            }
            Message::RouteEntry { rid, iface_id, metric, dest, mask, gw } => {
                let mut payload = vec![*rid, *iface_id];
                payload.extend_from_slice(&metric.to_be_bytes());
                payload.extend_from_slice(&dest.octets());
                payload.extend_from_slice(&mask.octets());
                payload.extend_from_slice(&gw.octets());
                (TYPE_ROUTE_ENTRY, SUBTYPE_NONE, payload)
            }
            Message::EndConfig => (TYPE_END_CONFIG, SUBTYPE_NONE, Vec::new()),
            Message::EthernetFrame { rid, iface_id, direction, frame } => {
                let mut payload = vec![*rid, *iface_id];
                payload.extend_from_slice(&(frame.len() as u16).to_be_bytes());
                payload.extend_from_slice(frame);
                (TYPE_ETHERNET_FRAME, direction.subtype(), payload)
            }
        }
    }

    /// Decodes a message from its type/subtype header fields plus the
    /// already-read payload.
    pub fn decode(msg_type: u8, subtype: u8, payload: &[u8]) -> Result<Message, ProtoError> {
        match msg_type {
            TYPE_HELLO => {
                let dir = Direction::from_subtype(subtype)
                    .ok_or(ProtoError::UnknownMessageType { msg_type, subtype })?;
                Ok(Message::Hello(dir))
            }
            TYPE_ROUTERS => {
                require(payload.len(), 1, msg_type)?;
                Ok(Message::Routers { num_routers: payload[0] })
            }
            TYPE_ROUTER => {
                require(payload.len(), 3, msg_type)?;
                let name = String::from_utf8_lossy(&payload[3..]).into_owned();
                Ok(Message::Router {
                    rid: payload[0],
                    num_interfaces: payload[1],
                    len_rtable: payload[2],
                    name,
                })
            }
            TYPE_INTERFACE => {
                require(payload.len(), 12, msg_type)?;
                let mut mac = [0u8; 6];
                mac.copy_from_slice(&payload[2..8]);
                let ip = Ipv4Addr::new(payload[8], payload[9], payload[10], payload[11]);
                let name = String::from_utf8_lossy(&payload[12..]).into_owned();
                Ok(Message::Interface { rid: payload[0], iface_id: payload[1], mac, ip, name })
            }
            TYPE_ROUTE_ENTRY => {
                require(payload.len(), 16, msg_type)?;
                let metric = u16::from_be_bytes([payload[2], payload[3]]);
                let dest = Ipv4Addr::new(payload[4], payload[5], payload[6], payload[7]);
                let mask = Ipv4Addr::new(payload[8], payload[9], payload[10], payload[11]);
                let gw = Ipv4Addr::new(payload[12], payload[13], payload[14], payload[15]);
                Ok(Message::RouteEntry { rid: payload[0], iface_id: payload[1], metric, dest, mask, gw })
            }
            TYPE_END_CONFIG => Ok(Message::EndConfig),
            TYPE_ETHERNET_FRAME => {
                require(payload.len(), 4, msg_type)?;
                let direction = Direction::from_subtype(subtype)
                    .ok_or(ProtoError::UnknownMessageType { msg_type, subtype })?;
                let frame_len = u16::from_be_bytes([payload[2], payload[3]]) as usize;
                require(payload.len(), 4 + frame_len, msg_type)?;
                Ok(Message::EthernetFrame {
                    rid: payload[0],
                    iface_id: payload[1],
                    direction,
                    frame: payload[4..4 + frame_len].to_vec(),
                })
            }
            other => Err(ProtoError::UnknownMessageType { msg_type: other, subtype }),
        }
    }
}

fn require(have: usize, need: usize, msg_type: u8) -> Result<(), ProtoError> {
    if have < need {
        Err(ProtoError::Truncated { msg_type, need, have })
    } else {
        Ok(())
    }
}
