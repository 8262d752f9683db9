//! Configuration handshake and the send/receive loop that wires
//! `router-core`'s frame handler to a single shim TCP connection.
//!
//! Per spec §6, the router is the TCP **listener**; the shim connects as a
//! client and immediately sends `Hello(to_router)`. One shim connection at a
//! time is served; closing it is the shutdown signal (spec §5): the reader
//! returns, the per-router timer tasks are cancelled, and any datagrams
//! still withheld on the pending ARP lists are dropped without generating
//! ICMP errors.

use crate::error::ProtoError;
use crate::framing::{read_message, write_message};
use crate::message::{Direction, Message};
use ipnet::Ipv4Net;
use router_core::{handle_frame, handle_sweep, Router, RouterConfig};
use router_wire::{Interface, InterfaceTable, RoutingTable};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// One frame the writer task should send down the wire, tagged with the
/// router and interface it originated from.
struct PendingSend {
    rid: u8,
    iface_id: u8,
    frame: Vec<u8>,
}

/// Runs the configuration handshake (Hello through EndConfig) and returns
/// the fully built, read-only router set. Grounded on
/// `original_source/src/python/chirouter/client.py`'s `connect()`, which
/// folds the same five message types into `router_ids`/`iface_ids` before
/// marking the client connected.
pub async fn handshake<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    reader: &mut R,
    writer: &mut W,
    config: RouterConfig,
) -> Result<HashMap<u8, Arc<Router>>, ProtoError> {
    match read_message(reader).await? {
        Message::Hello(Direction::ToRouter) => {}
        other => {
            log::error!("expected Hello(to_router) as the first message, got {other:?}");
            return Err(ProtoError::UnknownMessageType { msg_type: 0, subtype: 0 });
        }
    }
    // The shim blocks on this reply before sending any configuration
    // messages (see `client.py`'s `connect()`: it sends Hello then
    // immediately calls `next()` on `received_messages`).
    write_message(writer, &Message::Hello(Direction::FromRouter)).await?;

    struct Building {
        name: String,
        interfaces: InterfaceTable,
        routes: RoutingTable,
    }

    let mut routers: HashMap<u8, Building> = HashMap::new();

    loop {
        match read_message(reader).await? {
            Message::Routers { num_routers } => {
                log::info!("shim announced {num_routers} router(s)");
            }
            Message::Router { rid, name, .. } => {
                routers.insert(
                    rid,
                    Building { name, interfaces: InterfaceTable::new(), routes: RoutingTable::new() },
                );
            }
            Message::Interface { rid, iface_id, mac, ip, name } => {
                if let Some(r) = routers.get_mut(&rid) {
                    r.interfaces.insert(iface_id, Interface { name, mac, ip });
                } else {
                    log::warn!("Interface message for unknown router {rid}");
                }
            }
            Message::RouteEntry { rid, iface_id, metric, dest, mask, gw } => {
                if let Some(r) = routers.get_mut(&rid) {
                    match Ipv4Net::with_netmask(dest, mask) {
                        Ok(network) => r.routes.add(network, gw, metric, iface_id),
                        Err(e) => log::warn!("RouteEntry for router {rid} has an invalid netmask {mask}: {e}"),
                    }
                } else {
                    log::warn!("RouteEntry message for unknown router {rid}");
                }
            }
            Message::EndConfig => break,
            other => {
                log::warn!("unexpected message during configuration: {other:?}");
            }
        }
    }

    let routers = routers
        .into_iter()
        .map(|(rid, b)| {
            log::info!("router {rid} ({}) configured with {} interface(s)", b.name, b.interfaces.len());
            (rid, Arc::new(Router::new(b.interfaces, b.routes, config)))
        })
        .collect();
    Ok(routers)
}

/// Accepts shim connections on `listener` forever, serving them one at a
/// time as spec §6 describes ("the router process accepts one TCP
/// connection"). Returns only on an I/O error accepting a new connection.
pub async fn serve(listener: tokio::net::TcpListener, config: RouterConfig) -> Result<(), ProtoError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("shim connected from {peer}");
        if let Err(e) = handle_connection(stream, config).await {
            log::error!("shim connection from {peer} terminated: {e}");
        } else {
            log::info!("shim connection from {peer} closed");
        }
    }
}

/// Serves a single shim connection end to end: handshake, then the
/// reader/writer/timer tasks described in spec §5, until the connection
/// closes.
pub async fn handle_connection(stream: TcpStream, config: RouterConfig) -> Result<(), ProtoError> {
    let (mut read_half, mut write_half) = tokio::io::split(stream);

    let routers = handshake(&mut read_half, &mut write_half, config).await?;
    let routers = Arc::new(routers);

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel::<PendingSend>();

    let writer_task = tokio::spawn(run_writer(write_half, rx));

    let mut timer_handles = Vec::new();
    for (&rid, router) in routers.iter() {
        let notify = Arc::new(Notify::new());
        let handle = tokio::spawn(run_arp_timer(
            rid,
            Arc::clone(router),
            tx.clone(),
            Arc::clone(&notify),
            shutdown.clone(),
        ));
        timer_handles.push((rid, notify, handle));
    }
    let notifies: HashMap<u8, Arc<Notify>> =
        timer_handles.iter().map(|(rid, n, _)| (*rid, Arc::clone(n))).collect();

    let reader_result = run_reader(&mut read_half, &routers, &tx, &notifies).await;

    shutdown.cancel();
    drop(tx);
    for (_, _, handle) in timer_handles {
        let _ = handle.await;
    }
    let _ = writer_task.await;

    reader_result
}

async fn run_reader<R: AsyncRead + Unpin>(
    reader: &mut R,
    routers: &HashMap<u8, Arc<Router>>,
    tx: &mpsc::UnboundedSender<PendingSend>,
    notifies: &HashMap<u8, Arc<Notify>>,
) -> Result<(), ProtoError> {
    loop {
        let msg = match read_message(reader).await {
            Ok(msg) => msg,
            Err(ProtoError::UnexpectedEof) => return Ok(()),
            Err(e) => return Err(e),
        };

        match msg {
            Message::EthernetFrame { rid, iface_id, direction: Direction::ToRouter, frame } => {
                log::trace!("frame in: router {rid} iface {iface_id} ({} bytes)", frame.len());
                let Some(router) = routers.get(&rid) else {
                    log::warn!("EthernetFrame for unknown router {rid}");
                    continue;
                };
                let outbound = handle_frame(router, iface_id, &frame, Instant::now());
                for out in outbound {
                    let _ = tx.send(PendingSend { rid, iface_id: out.iface, frame: out.frame });
                }
                if let Some(notify) = notifies.get(&rid) {
                    notify.notify_one();
                }
            }
            Message::Hello(_) => log::trace!("ignoring unexpected Hello after handshake"),
            other => log::warn!("ignoring unexpected message after handshake: {other:?}"),
        }
    }
}

async fn run_writer<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::UnboundedReceiver<PendingSend>) {
    while let Some(send) = rx.recv().await {
        let msg = Message::EthernetFrame {
            rid: send.rid,
            iface_id: send.iface_id,
            direction: Direction::FromRouter,
            frame: send.frame,
        };
        log::trace!("frame out: router {} iface {}", send.rid, send.iface_id);
        if let Err(e) = write_message(&mut writer, &msg).await {
            log::error!("failed writing frame to shim: {e}");
            return;
        }
    }
}

async fn run_arp_timer(
    rid: u8,
    router: Arc<Router>,
    tx: mpsc::UnboundedSender<PendingSend>,
    notify: Arc<Notify>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(router.config.arp_retry_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
            _ = notify.notified() => {}
        }
        let now = Instant::now();
        let actions = router.pending.sweep(now);
        if actions.is_empty() {
            continue;
        }
        let outbound = handle_sweep(&router, actions, now);
        for out in outbound {
            if tx.send(PendingSend { rid, iface_id: out.iface, frame: out.frame }).is_err() {
                return;
            }
        }
    }
}
