//! Per-frame decision logic: ARP, ICMP termination and IPv4 forwarding. A
//! free function over `&Router` with no other state, so it is unit-testable
//! without a network or a clock beyond the `now` it is given.

use crate::pending::EnqueueOutcome;
use crate::router::Router;
use router_wire::arp::{self, ArpPacket};
use router_wire::ethernet::{self, EthernetHeader};
use router_wire::icmp::{self, IcmpHeader};
use router_wire::interface::InterfaceIndex;
use router_wire::ipv4::{self, Ipv4Header};
use std::net::Ipv4Addr;
use std::time::Instant;

/// One frame this router wants to send.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub iface: InterfaceIndex,
    pub frame: Vec<u8>,
}

pub fn handle_frame(
    router: &Router,
    ingress_iface: InterfaceIndex,
    frame: &[u8],
    now: Instant,
) -> Vec<Outbound> {
    let Some(ingress) = router.interfaces.get(ingress_iface) else {
        log::warn!("frame on unknown interface index {ingress_iface}");
        return Vec::new();
    };

    let (eth, payload) = match EthernetHeader::parse(frame) {
        Ok(v) => v,
        Err(e) => {
            log::trace!("dropping frame: {e}");
            return Vec::new();
        }
    };

    if !eth.is_broadcast() && eth.dst != ingress.mac {
        return Vec::new();
    }

    match eth.ethertype {
        ethernet::ETHERTYPE_ARP => handle_arp(router, ingress_iface, &eth, payload, now),
        ethernet::ETHERTYPE_IPV4 => handle_ipv4(router, ingress_iface, payload, now),
        other => {
            log::trace!("dropping frame with unhandled ethertype {other:#06x}");
            Vec::new()
        }
    }
}

fn handle_arp(
    router: &Router,
    ingress_iface: InterfaceIndex,
    eth: &EthernetHeader,
    payload: &[u8],
    now: Instant,
) -> Vec<Outbound> {
    let ingress = router.interfaces.get(ingress_iface).expect("checked by caller");

    let arp_pkt = match ArpPacket::parse(payload) {
        Ok(p) => p,
        Err(e) => {
            log::trace!("dropping malformed ARP: {e}");
            return Vec::new();
        }
    };

    if arp_pkt.is_request() && arp_pkt.tpa == ingress.ip {
        let reply = ArpPacket {
            op: arp::OP_REPLY,
            sha: ingress.mac,
            spa: ingress.ip,
            tha: arp_pkt.sha,
            tpa: arp_pkt.spa,
        };
        let frame = build_arp_frame(ingress.mac, arp_pkt.sha, &reply);
        return vec![Outbound { iface: ingress_iface, frame }];
    }

    if arp_pkt.is_reply() && eth.dst == ingress.mac && arp_pkt.tpa == ingress.ip {
        let released = router.handle_arp_reply(arp_pkt.spa, arp_pkt.sha, now);
        let mut out = Vec::with_capacity(released.len());
        for r in released {
            let mut datagram = r.datagram;
            match ipv4::decrement_ttl_in_place(&mut datagram) {
                Ok(true) => {}
                Ok(false) | Err(_) => continue, // already expired or malformed, drop silently
            }
            let Some(egress) = router.interfaces.get(r.egress_iface) else { continue };
            let frame = build_ipv4_frame(egress.mac, arp_pkt.sha, &datagram);
            out.push(Outbound { iface: r.egress_iface, frame });
        }
        return out;
    }

    Vec::new()
}

fn handle_ipv4(router: &Router, ingress_iface: InterfaceIndex, datagram: &[u8], now: Instant) -> Vec<Outbound> {
    let ingress = router.interfaces.get(ingress_iface).expect("checked by caller");

    let (ip, _) = match Ipv4Header::parse(datagram) {
        Ok(v) => v,
        Err(e) => {
            log::trace!("dropping malformed IPv4 datagram: {e}");
            return Vec::new();
        }
    };
    if !Ipv4Header::verify_checksum(datagram, ip.ihl) {
        log::trace!("dropping IPv4 datagram with bad checksum");
        return Vec::new();
    }

    match router.interfaces.find_by_ip(ip.dst) {
        Some(local_iface) if local_iface != ingress_iface => {
            emit_icmp_error(
                router,
                ingress_iface,
                icmp::TYPE_DEST_UNREACHABLE,
                icmp::CODE_HOST_UNREACHABLE,
                &ip,
                datagram,
                now,
            )
        }
        Some(_) => handle_local_datagram(router, ingress_iface, &ip, datagram, now),
        None => handle_forwarding(router, ingress_iface, &ip, datagram, now),
    }
}

fn handle_local_datagram(
    router: &Router,
    ingress_iface: InterfaceIndex,
    ip: &Ipv4Header,
    datagram: &[u8],
    now: Instant,
) -> Vec<Outbound> {
    let ingress = router.interfaces.get(ingress_iface).expect("checked by caller");
    let icmp_payload = &datagram[ip.ihl_bytes()..];

    match ip.protocol {
        ipv4::PROTO_ICMP => {
            let (icmp_hdr, rest) = match IcmpHeader::parse(icmp_payload) {
                Ok(v) => v,
                Err(_) => return Vec::new(),
            };
            if icmp_hdr.icmp_type != icmp::TYPE_ECHO_REQUEST {
                return Vec::new();
            }
            let reply_icmp = icmp::echo_reply_header(icmp_hdr.rest_of_header);
            let new_ip = Ipv4Header {
                ihl: 5,
                tos: 0,
                total_length: (ipv4::MIN_HEADER_LEN + icmp::HEADER_LEN + rest.len()) as u16,
                identification: 0,
                flags_fragment_offset: 0,
                ttl: ipv4::DEFAULT_TTL,
                protocol: ipv4::PROTO_ICMP,
                header_checksum: 0,
                src: ingress.ip,
                dst: ip.src,
            };
            route_and_emit_new_datagram(router, ingress_iface, new_ip, |buf| {
                reply_icmp.build_with_payload(buf, rest).expect("buffer sized exactly")
            }, now)
        }
        ipv4::PROTO_TCP | ipv4::PROTO_UDP => emit_icmp_error(
            router,
            ingress_iface,
            icmp::TYPE_DEST_UNREACHABLE,
            icmp::CODE_PORT_UNREACHABLE,
            ip,
            datagram,
            now,
        ),
        _ => Vec::new(),
    }
}

fn handle_forwarding(
    router: &Router,
    ingress_iface: InterfaceIndex,
    ip: &Ipv4Header,
    datagram: &[u8],
    now: Instant,
) -> Vec<Outbound> {
    if ip.ttl <= 1 {
        return emit_icmp_error(
            router,
            ingress_iface,
            icmp::TYPE_TIME_EXCEEDED,
            icmp::CODE_TTL_EXCEEDED,
            ip,
            datagram,
            now,
        );
    }

    let Some(next_hop) = router.routes.lookup(ip.dst) else {
        return emit_icmp_error(
            router,
            ingress_iface,
            icmp::TYPE_DEST_UNREACHABLE,
            icmp::CODE_NET_UNREACHABLE,
            ip,
            datagram,
            now,
        );
    };

    forward_existing_datagram(router, ingress_iface, next_hop.out_iface, next_hop.next_hop_ip, datagram.to_vec(), now, || {
        emit_icmp_error(router, ingress_iface, icmp::TYPE_DEST_UNREACHABLE, icmp::CODE_HOST_UNREACHABLE, ip, datagram, now)
    })
}

/// Forwards an already-fully-built IP datagram toward a known next hop:
/// resolve the MAC (sending directly, or queueing on the pending ARP list),
/// decrementing TTL and recomputing the checksum only once the MAC is known.
/// `on_queue_full` is invoked if the pending entry's withheld queue was
/// already at capacity; callers forwarding
/// inbound traffic answer with Host Unreachable there, while callers
/// forwarding a datagram this router generated itself drop silently to
/// avoid ICMP errors generating further ICMP errors.
fn forward_existing_datagram(
    router: &Router,
    ingress_iface: InterfaceIndex,
    egress_iface: InterfaceIndex,
    next_hop_ip: Ipv4Addr,
    datagram: Vec<u8>,
    now: Instant,
    on_queue_full: impl FnOnce() -> Vec<Outbound>,
) -> Vec<Outbound> {
    match router.arp_cache.lookup(next_hop_ip, now) {
        Some(next_hop_mac) => {
            let Some(egress) = router.interfaces.get(egress_iface) else { return Vec::new() };
            let mut datagram = datagram;
            match ipv4::decrement_ttl_in_place(&mut datagram) {
                Ok(true) => {}
                _ => return Vec::new(),
            }
            let frame = build_ipv4_frame(egress.mac, next_hop_mac, &datagram);
            vec![Outbound { iface: egress_iface, frame }]
        }
        None => match router.enqueue_pending(next_hop_ip, egress_iface, datagram, ingress_iface, now) {
            EnqueueOutcome::CreatedNewRequest => {
                let Some(egress) = router.interfaces.get(egress_iface) else { return Vec::new() };
                let request = ArpPacket {
                    op: arp::OP_REQUEST,
                    sha: egress.mac,
                    spa: egress.ip,
                    tha: [0; 6],
                    tpa: next_hop_ip,
                };
                let frame = build_arp_frame(egress.mac, ethernet::BROADCAST_MAC, &request);
                vec![Outbound { iface: egress_iface, frame }]
            }
            EnqueueOutcome::Appended => Vec::new(),
            EnqueueOutcome::DroppedQueueFull => on_queue_full(),
        },
    }
}

/// Builds a brand-new IP datagram (header filled in by `write_payload`) and
/// routes it exactly like a forwarded datagram: ARP cache hit sends now,
/// miss queues on the pending list. No recursive ICMP error is generated if
/// this datagram's own queue slot overflows; it is simply dropped with a
/// warning, since it was already an error reply or an echo reply.
fn route_and_emit_new_datagram(
    router: &Router,
    ingress_iface: InterfaceIndex,
    mut ip: Ipv4Header,
    write_payload: impl FnOnce(&mut [u8]),
    now: Instant,
) -> Vec<Outbound> {
    let Some(next_hop) = router.routes.lookup(ip.dst) else {
        log::warn!("no route to {} while generating a local reply; dropping", ip.dst);
        return Vec::new();
    };

    let total_len = ip.total_length as usize;
    let mut datagram = vec![0u8; total_len];
    ip.header_checksum = 0;
    let payload_buf = ip.build(&mut datagram).expect("buffer sized exactly");
    write_payload(payload_buf);

    let dst = ip.dst;
    forward_existing_datagram(router, ingress_iface, next_hop.out_iface, next_hop.next_hop_ip, datagram, now, || {
        log::warn!("pending queue full while generating a local reply to {dst}; dropping");
        Vec::new()
    })
}

/// Builds and routes an ICMP error datagram back toward the original sender.
fn emit_icmp_error(
    router: &Router,
    ingress_iface: InterfaceIndex,
    icmp_type: u8,
    code: u8,
    original_ip: &Ipv4Header,
    original_datagram: &[u8],
    now: Instant,
) -> Vec<Outbound> {
    let ingress = router.interfaces.get(ingress_iface).expect("checked by caller");
    let embedded = icmp::error_payload(original_ip.ihl_bytes(), original_datagram);

    let new_ip = Ipv4Header {
        ihl: 5,
        tos: 0,
        total_length: (ipv4::MIN_HEADER_LEN + icmp::HEADER_LEN + embedded.len()) as u16,
        identification: 0,
        flags_fragment_offset: 0,
        ttl: ipv4::DEFAULT_TTL,
        protocol: ipv4::PROTO_ICMP,
        header_checksum: 0,
        src: ingress.ip,
        dst: original_ip.src,
    };
    let icmp_hdr = icmp::error_header(icmp_type, code);

    route_and_emit_new_datagram(
        router,
        ingress_iface,
        new_ip,
        |buf| icmp_hdr.build_with_payload(buf, embedded).expect("buffer sized exactly"),
        now,
    )
}

/// Turns the actions produced by one [`crate::pending::PendingArpList::sweep`]
/// call into frames to send: a fresh broadcast ARP request for each retry,
/// and a Host Unreachable reply for every datagram an abandoned entry was
/// still holding.
pub fn handle_sweep(router: &Router, actions: Vec<crate::pending::SweepAction>, now: Instant) -> Vec<Outbound> {
    let mut out = Vec::new();
    for action in actions {
        match action {
            crate::pending::SweepAction::Retry { target_ip, egress_iface } => {
                let Some(egress) = router.interfaces.get(egress_iface) else { continue };
                let request = ArpPacket {
                    op: arp::OP_REQUEST,
                    sha: egress.mac,
                    spa: egress.ip,
                    tha: [0; 6],
                    tpa: target_ip,
                };
                let frame = build_arp_frame(egress.mac, ethernet::BROADCAST_MAC, &request);
                out.push(Outbound { iface: egress_iface, frame });
            }
            crate::pending::SweepAction::Abandoned { withheld } => {
                for w in withheld {
                    let Ok((ip, _)) = Ipv4Header::parse(&w.datagram) else { continue };
                    out.extend(emit_icmp_error(
                        router,
                        w.ingress_iface,
                        icmp::TYPE_DEST_UNREACHABLE,
                        icmp::CODE_HOST_UNREACHABLE,
                        &ip,
                        &w.datagram,
                        now,
                    ));
                }
            }
        }
    }
    out
}

fn build_arp_frame(src_mac: [u8; 6], dst_mac: [u8; 6], arp_pkt: &ArpPacket) -> Vec<u8> {
    let mut frame = vec![0u8; ethernet::HEADER_LEN + arp::HEADER_LEN];
    let eth = EthernetHeader { dst: dst_mac, src: src_mac, ethertype: ethernet::ETHERTYPE_ARP };
    let payload = eth.build(&mut frame).expect("buffer sized exactly");
    arp_pkt.build(payload).expect("buffer sized exactly");
    frame
}

fn build_ipv4_frame(src_mac: [u8; 6], dst_mac: [u8; 6], datagram: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; ethernet::HEADER_LEN + datagram.len()];
    let eth = EthernetHeader { dst: dst_mac, src: src_mac, ethertype: ethernet::ETHERTYPE_IPV4 };
    let payload = eth.build(&mut frame).expect("buffer sized exactly");
    payload.copy_from_slice(datagram);
    frame
}
