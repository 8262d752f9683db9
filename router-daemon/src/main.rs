//! `chirouterd`: accepts one shim connection at a time on `--listen`,
//! negotiates the configuration handshake, and runs the packet-processing
//! engine from `router-core` over it until the shim disconnects.
//!
//! CLI argument handling and logging plumbing are explicitly out of scope
//! for the router engine itself (spec §1); this binary is the thin
//! orchestration layer around it.

use anyhow::{Context, Result};
use clap::Parser;
use router_core::RouterConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "chirouterd", about = "Software IP router engine, speaking the chirouter shim protocol")]
struct Args {
    /// Address to listen on for the shim's TCP connection.
    #[arg(long, default_value = "0.0.0.0:23300")]
    listen: SocketAddr,

    /// How long a learned ARP cache entry stays valid.
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    arp_ttl: Duration,

    /// How long between ARP request retries for one pending entry.
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    retry_interval: Duration,

    /// Retries attempted before abandoning a pending entry and answering
    /// every withheld datagram with Host Unreachable.
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Withheld datagrams a single pending ARP entry may hold before
    /// further datagrams are dropped with an immediate Host Unreachable.
    #[arg(long, default_value_t = 16)]
    max_withheld: usize,

    /// Overrides RUST_LOG when set (e.g. "debug", "trace").
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let config = RouterConfig {
        arp_cache_ttl: args.arp_ttl,
        arp_retry_interval: args.retry_interval,
        arp_max_retries: args.max_retries,
        max_withheld: args.max_withheld,
    };

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    log::info!("chirouterd listening on {}", args.listen);

    router_proto::serve(listener, config).await.context("shim connection loop failed")?;
    Ok(())
}

fn init_logging(log_level: Option<&str>) {
    let env = env_logger::Env::default().default_filter_or(log_level.unwrap_or("info"));
    env_logger::Builder::from_env(env).init();
}
