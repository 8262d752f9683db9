//! Route table and longest-prefix-match lookup.
//!
//! Uses `prefix_trie::PrefixMap` for the longest-prefix match; among routes
//! whose prefix length is maximal, the one with the smallest metric wins,
//! then the one that was declared first.

use crate::interface::InterfaceIndex;
use ipnet::Ipv4Net;
use prefix_trie::PrefixMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub network: Ipv4Net,
    /// `0.0.0.0` means "on-link": the next hop is the destination itself.
    pub gateway: Ipv4Addr,
    pub metric: u16,
    pub out_iface: InterfaceIndex,
    /// Position this route was declared in, used as the final tie-break.
    pub order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub out_iface: InterfaceIndex,
    pub next_hop_ip: Ipv4Addr,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    by_network: PrefixMap<Ipv4Net, Vec<Route>>,
    next_order: u32,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self { by_network: PrefixMap::new(), next_order: 0 }
    }

    pub fn add(&mut self, network: Ipv4Net, gateway: Ipv4Addr, metric: u16, out_iface: InterfaceIndex) {
        let route = Route { network, gateway, metric, out_iface, order: self.next_order };
        self.next_order += 1;
        if let Some(existing) = self.by_network.get_mut(&network) {
            existing.push(route);
        } else {
            self.by_network.insert(network, vec![route]);
        }
    }

    /// Longest-prefix match, ties broken by smaller metric then
    /// declaration order.
    pub fn lookup(&self, dst: Ipv4Addr) -> Option<NextHop> {
        let dst_net = Ipv4Net::from(dst);
        let (_, candidates) = self.by_network.get_lpm(&dst_net)?;
        let best = candidates
            .iter()
            .min_by_key(|r| (r.metric, r.order))
            .expect("entry vecs are never left empty");
        let next_hop_ip = if best.gateway.is_unspecified() { dst } else { best.gateway };
        Some(NextHop { out_iface: best.out_iface, next_hop_ip })
    }

    pub fn is_empty(&self) -> bool {
        self.next_order == 0
    }
}
