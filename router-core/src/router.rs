//! A single configured router: its immutable interface/route tables plus
//! its mutable ARP cache and pending-ARP list.

use crate::arp_cache::ArpCache;
use crate::config::RouterConfig;
use crate::pending::{EnqueueOutcome, PendingArpList, Released};
use router_wire::{InterfaceTable, RoutingTable};
use std::net::Ipv4Addr;
use std::time::Instant;

pub struct Router {
    pub interfaces: InterfaceTable,
    pub routes: RoutingTable,
    pub arp_cache: ArpCache,
    pub pending: PendingArpList,
    pub config: RouterConfig,
}

impl Router {
    pub fn new(interfaces: InterfaceTable, routes: RoutingTable, config: RouterConfig) -> Self {
        Self {
            interfaces,
            routes,
            arp_cache: ArpCache::new(config.arp_cache_ttl),
            pending: PendingArpList::new(
                config.arp_max_retries,
                config.arp_retry_interval,
                config.max_withheld,
            ),
            config,
        }
    }

    /// Inserts the fresh ARP cache entry and releases anything that was
    /// waiting on it, in FIFO order, across every egress interface it was
    /// queued on.
    pub fn handle_arp_reply(&self, ip: Ipv4Addr, mac: [u8; 6], now: Instant) -> Vec<Released> {
        self.arp_cache.insert(ip, mac, now);
        self.pending.resolve(ip)
    }

    pub fn enqueue_pending(
        &self,
        target_ip: Ipv4Addr,
        egress_iface: u8,
        datagram: Vec<u8>,
        ingress_iface: u8,
        now: Instant,
    ) -> EnqueueOutcome {
        self.pending.enqueue(target_ip, egress_iface, datagram, ingress_iface, now)
    }
}
