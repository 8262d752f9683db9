#![doc = include_str!("../README.md")]

pub mod arp;
pub mod checksum;
pub mod error;
pub mod ethernet;
pub mod icmp;
pub mod interface;
pub mod ipv4;
pub mod route;

pub use error::WireError;
pub use interface::{Interface, InterfaceIndex, InterfaceTable};
pub use route::{NextHop, Route, RoutingTable};
