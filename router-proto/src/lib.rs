#![doc = include_str!("../README.md")]

pub mod driver;
pub mod error;
pub mod framing;
pub mod message;

pub use driver::{handle_connection, handshake, serve};
pub use error::ProtoError;
pub use framing::{read_message, write_message};
pub use message::{Direction, Message};
