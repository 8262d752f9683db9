//! Pending ARP list: one entry per unresolved next hop, holding the
//! withheld datagrams that are waiting on it. Single mutex, held only
//! across in-memory bookkeeping; callers perform the actual sends after
//! the lock is released.

use router_wire::InterfaceIndex;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// One IPv4 datagram withheld while its next hop's MAC is being resolved.
#[derive(Debug, Clone)]
pub struct Withheld {
    pub datagram: Vec<u8>,
    pub ingress_iface: InterfaceIndex,
}

#[derive(Debug)]
struct PendingEntry {
    attempts_remaining: u32,
    next_retry_deadline: Instant,
    withheld: VecDeque<Withheld>,
}

/// A datagram released because its next hop resolved.
#[derive(Debug, Clone)]
pub struct Released {
    pub datagram: Vec<u8>,
    pub ingress_iface: InterfaceIndex,
    pub egress_iface: InterfaceIndex,
}

/// What [`PendingArpList::enqueue`] did, so the caller knows whether to
/// emit a fresh ARP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new pending entry was created; the caller must emit one ARP
    /// request now on `egress_iface`.
    CreatedNewRequest,
    /// An existing entry absorbed the datagram; nothing to send.
    Appended,
    /// The entry's withheld queue was already at the configured cap; the
    /// datagram was dropped and the caller should answer with an
    /// immediate Host Unreachable.
    DroppedQueueFull,
}

/// What to do with one abandoned pending entry after [`PendingArpList::sweep`].
#[derive(Debug, Clone)]
pub enum SweepAction {
    /// Re-emit an ARP request on `egress_iface` for `target_ip`.
    Retry { target_ip: Ipv4Addr, egress_iface: InterfaceIndex },
    /// Attempts exhausted: every withheld datagram should get a Host
    /// Unreachable reply, then the entry is gone.
    Abandoned { withheld: Vec<Withheld> },
}

pub struct PendingArpList {
    max_retries: u32,
    retry_interval: Duration,
    max_withheld: usize,
    entries: std::sync::Mutex<HashMap<(Ipv4Addr, InterfaceIndex), PendingEntry>>,
}

impl PendingArpList {
    pub fn new(max_retries: u32, retry_interval: Duration, max_withheld: usize) -> Self {
        Self {
            max_retries,
            retry_interval,
            max_withheld,
            entries: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Appends to the matching pending entry, creating one if none exists
    /// yet for this (target, egress interface) pair.
    pub fn enqueue(
        &self,
        target_ip: Ipv4Addr,
        egress_iface: InterfaceIndex,
        datagram: Vec<u8>,
        ingress_iface: InterfaceIndex,
        now: Instant,
    ) -> EnqueueOutcome {
        let mut entries = self.entries.lock().expect("pending arp mutex poisoned");
        let key = (target_ip, egress_iface);
        if let Some(entry) = entries.get_mut(&key) {
            if entry.withheld.len() >= self.max_withheld {
                return EnqueueOutcome::DroppedQueueFull;
            }
            entry.withheld.push_back(Withheld { datagram, ingress_iface });
            EnqueueOutcome::Appended
        } else {
            let mut withheld = VecDeque::new();
            withheld.push_back(Withheld { datagram, ingress_iface });
            entries.insert(
                key,
                PendingEntry {
                    attempts_remaining: self.max_retries,
                    next_retry_deadline: now + self.retry_interval,
                    withheld,
                },
            );
            EnqueueOutcome::CreatedNewRequest
        }
    }

    /// Does not touch the ARP cache (the caller does that — see
    /// [`crate::router::Router::handle_arp_reply`]). Removes every pending
    /// entry keyed on `target_ip`, across all egress interfaces (spec §4.4:
    /// "Remove the entry (if any) keyed on target_ip across all
    /// egress_ifaces"), and returns their withheld datagrams, each tagged
    /// with the egress interface its own entry was queued on.
    pub fn resolve(&self, target_ip: Ipv4Addr) -> Vec<Released> {
        let mut entries = self.entries.lock().expect("pending arp mutex poisoned");
        let matching: Vec<(Ipv4Addr, InterfaceIndex)> =
            entries.keys().filter(|&&(ip, _)| ip == target_ip).copied().collect();
        let mut released = Vec::new();
        for key in matching {
            let egress_iface = key.1;
            if let Some(entry) = entries.remove(&key) {
                released.extend(entry.withheld.into_iter().map(|w| Released {
                    datagram: w.datagram,
                    ingress_iface: w.ingress_iface,
                    egress_iface,
                }));
            }
        }
        released
    }

    /// Gathers actions under the lock, returns them for the caller to
    /// execute after releasing it.
    pub fn sweep(&self, now: Instant) -> Vec<SweepAction> {
        let mut entries = self.entries.lock().expect("pending arp mutex poisoned");
        let mut actions = Vec::new();
        entries.retain(|&(target_ip, egress_iface), entry| {
            if entry.next_retry_deadline > now {
                return true;
            }
            if entry.attempts_remaining > 0 {
                entry.attempts_remaining -= 1;
                entry.next_retry_deadline = now + self.retry_interval;
                actions.push(SweepAction::Retry { target_ip, egress_iface });
                true
            } else {
                let withheld = std::mem::take(&mut entry.withheld).into_iter().collect();
                actions.push(SweepAction::Abandoned { withheld });
                false
            }
        });
        actions
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
