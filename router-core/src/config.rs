//! Tunable router timing and capacity parameters, exposed as configuration
//! rather than hardcoded so `router-daemon`'s CLI can override them.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// How long a learned ARP cache entry stays valid. Default 15s.
    pub arp_cache_ttl: Duration,
    /// How long between ARP request retries for one pending entry. Default 1s.
    pub arp_retry_interval: Duration,
    /// Retries attempted before abandoning a pending entry. Default 5.
    pub arp_max_retries: u32,
    /// Cap on withheld datagrams per pending entry before overflow drops
    /// with an immediate Host Unreachable.
    pub max_withheld: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            arp_cache_ttl: Duration::from_secs(15),
            arp_retry_interval: Duration::from_secs(1),
            arp_max_retries: 5,
            max_withheld: 16,
        }
    }
}
