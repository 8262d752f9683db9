//! ARP cache: IPv4 → MAC, TTL-bounded, one mutex, lazy eviction. Time is
//! passed in explicitly by the caller rather than read from a global
//! clock, so the cache and its callers stay deterministic under test.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Entry {
    mac: [u8; 6],
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct ArpCache {
    ttl: Duration,
    entries: Mutex<HashMap<Ipv4Addr, Entry>>,
}

impl ArpCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the MAC if present and not older than the configured TTL.
    /// A stale entry is treated as absent but is not removed here (lazy
    /// eviction).
    pub fn lookup(&self, ip: Ipv4Addr, now: Instant) -> Option<[u8; 6]> {
        let entries = self.entries.lock().expect("arp cache mutex poisoned");
        entries.get(&ip).and_then(|entry| {
            if now.saturating_duration_since(entry.inserted_at) <= self.ttl {
                Some(entry.mac)
            } else {
                None
            }
        })
    }

    /// Overwrites any existing entry and refreshes the timestamp.
    /// Idempotent: inserting the same (ip, mac) pair twice leaves the
    /// cache equivalent to inserting it once.
    pub fn insert(&self, ip: Ipv4Addr, mac: [u8; 6], now: Instant) {
        let mut entries = self.entries.lock().expect("arp cache mutex poisoned");
        entries.insert(ip, Entry { mac, inserted_at: now });
    }
}
