use std::fmt;

/// Error returned by the header parse functions in this crate: a frame
/// shorter than the header it claims to be, or an IPv4 header with
/// `ihl < 5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The buffer was shorter than the header requires.
    Truncated { need: usize, have: usize },
    /// IPv4 `ihl` was less than 5 (the minimum header length in 32-bit words).
    UnsupportedIhl(u8),
    /// IPv4 `version` was not 4.
    BadVersion(u8),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated { need, have } => {
                write!(f, "truncated frame: need {need} bytes, have {have}")
            }
            WireError::UnsupportedIhl(ihl) => write!(f, "unsupported IHL {ihl} (< 5)"),
            WireError::BadVersion(v) => write!(f, "unsupported IP version {v}"),
        }
    }
}

impl std::error::Error for WireError {}

pub(crate) fn require(have: usize, need: usize) -> Result<(), WireError> {
    if have < need {
        Err(WireError::Truncated { need, have })
    } else {
        Ok(())
    }
}
