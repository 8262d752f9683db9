#![doc = include_str!("../README.md")]

pub mod arp_cache;
pub mod config;
pub mod frame_handler;
pub mod pending;
pub mod router;

pub use arp_cache::ArpCache;
pub use config::RouterConfig;
pub use frame_handler::{handle_frame, handle_sweep, Outbound};
pub use pending::{EnqueueOutcome, PendingArpList, Released, SweepAction, Withheld};
pub use router::Router;
