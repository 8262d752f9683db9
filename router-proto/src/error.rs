use std::fmt;
use std::io;

/// Protocol framing errors (spec §7 category 1): bad length, EOF mid-message,
/// or a header naming a message type this driver does not understand. All of
/// these are terminal — the caller closes the shim connection.
#[derive(Debug)]
pub enum ProtoError {
    Io(io::Error),
    UnexpectedEof,
    UnknownMessageType { msg_type: u8, subtype: u8 },
    Truncated { msg_type: u8, need: usize, have: usize },
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoError::Io(e) => write!(f, "io error: {e}"),
            ProtoError::UnexpectedEof => write!(f, "connection closed mid-message"),
            ProtoError::UnknownMessageType { msg_type, subtype } => {
                write!(f, "unknown message type {msg_type} (subtype {subtype})")
            }
            ProtoError::Truncated { msg_type, need, have } => {
                write!(f, "message type {msg_type} payload too short: need {need}, have {have}")
            }
        }
    }
}

impl std::error::Error for ProtoError {}

impl From<io::Error> for ProtoError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ProtoError::UnexpectedEof
        } else {
            ProtoError::Io(e)
        }
    }
}
