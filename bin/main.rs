use colored::Colorize;
use tracing::{info, warn};
use tracing_subscriber;

use clap::{value_t, App, Arg};

use zfx_peer::metrics::MemoryMetrics;
use zfx_peer::p2p::prelude::*;
use zfx_peer::p2p::{on_peer_error_recipient, NetAddress, PeerErrored};

use actix::{Actor, Context, Handler};
use ed25519_dalek::Keypair;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use std::net::SocketAddr;

const PING_STREAM: StreamId = 0x40;
const PONG_STREAM: StreamId = 0x41;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ping {
    seq: u64,
}

impl PlainMessage for Ping {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pong {
    seq: u64,
}

impl PlainMessage for Pong {}

/// Answers every ping with a pong carrying the same sequence number.
struct Ponger;

impl Reactor<Ping> for Ponger {
    fn receive(&self, envelope: Envelope<Ping>) -> BoxFuture<'_, ()> {
        async move {
            let pong = Pong { seq: envelope.message.seq };
            if !envelope.src.send(PONG_STREAM, &pong).await {
                warn!("{} could not answer ping {}", envelope.src, pong.seq);
            }
        }
        .boxed()
    }
}

struct PongCounter {
    tx: mpsc::UnboundedSender<u64>,
}

impl Reactor<Pong> for PongCounter {
    fn receive(&self, envelope: Envelope<Pong>) -> BoxFuture<'_, ()> {
        let _ = self.tx.send(envelope.message.seq);
        futures::future::ready(()).boxed()
    }
}

/// Logs peer faults, standing in for the switch that would evict the peer.
struct Monitor;

impl Actor for Monitor {
    type Context = Context<Self>;
}

impl Handler<PeerErrored> for Monitor {
    type Result = ();

    fn handle(&mut self, msg: PeerErrored, _ctx: &mut Context<Self>) -> Self::Result {
        warn!("[{}] {} failed: {}", "monitor".red(), msg.peer, msg.error);
    }
}

fn node(moniker: &str, addr: SocketAddr) -> NodeInfo {
    let keypair = Keypair::generate(&mut OsRng {});
    let id = NodeId::from_public_key(&keypair.public);
    NodeInfo::new(id, &addr.to_string(), "peer-demo", vec![PING_STREAM, PONG_STREAM])
        .with_moniker(moniker)
}

async fn run(messages: u64, settings: PeerSettings) -> Result<()> {
    let alice_addr: SocketAddr = "127.0.0.1:26656".parse().map_err(|_| Error::PeerParseError)?;
    let bob_addr: SocketAddr = "127.0.0.1:26657".parse().map_err(|_| Error::PeerParseError)?;
    let descs = vec![
        StreamDescriptor::new(PING_STREAM, "ping").with_priority(5),
        StreamDescriptor::new(PONG_STREAM, "pong"),
    ];
    let (alice_conn, bob_conn) = MemoryConnection::pair(alice_addr, bob_addr, &descs);

    let registry = MemoryMetrics::new();
    let monitor = Monitor.start();
    let (tx, mut pongs) = mpsc::unbounded_channel();

    // alice dials bob and counts pongs, bob answers pings
    let mut alice_config = PeerConfig::new(
        Arc::new(DispatchTable::new().route::<Pong>(PONG_STREAM, Arc::new(PongCounter { tx }))),
        descs.clone(),
    );
    alice_config.outbound = true;
    alice_config.is_persistent = Some(Arc::new(|addr: &NetAddress| addr.port == 26657));
    alice_config.metrics = registry.metrics();
    alice_config.settings = settings.clone();
    alice_config.on_peer_error = Some(on_peer_error_recipient(monitor.clone().recipient()));

    let bob_dispatch = DispatchTable::new().route::<Ping>(PING_STREAM, Arc::new(Ponger));
    let mut bob_config = PeerConfig::new(Arc::new(bob_dispatch), descs);
    bob_config.metrics = registry.metrics();
    bob_config.settings = settings;
    bob_config.on_peer_error = Some(on_peer_error_recipient(monitor.recipient()));

    let bob_info = node("bob", bob_addr);
    let alice_info = node("alice", alice_addr);
    bob_info.validate()?;
    alice_info.validate()?;

    // each side holds a peer handle for the other node
    let bob_net_addr = NetAddress::new(bob_info.id, bob_addr);
    let alice_net_addr = NetAddress::new(alice_info.id, alice_addr);
    let to_bob = wrap_peer(Arc::new(alice_conn), bob_info, &alice_config, bob_net_addr);
    let to_alice = wrap_peer(Arc::new(bob_conn), alice_info, &bob_config, alice_net_addr);
    to_bob.start()?;
    to_alice.start()?;
    info!("[{}] {} persistent = {}", "peer-demo".blue(), to_bob, to_bob.is_persistent());

    for seq in 0..messages {
        if !to_bob.send(PING_STREAM, &Ping { seq }).await {
            warn!("[{}] ping {} was not sent", "peer-demo".blue(), seq);
        }
    }

    let mut received = 0;
    while received < messages {
        match timeout(Duration::from_secs(5), pongs.recv()).await {
            Ok(Some(_)) => received += 1,
            _ => break,
        }
    }
    info!("[{}] received {} of {} pongs", "peer-demo".blue(), received, messages);

    to_bob.flush_stop().await?;
    to_bob.wait().await;
    // bob's side notices the closed connection by itself
    to_alice.wait().await;

    println!("{}", registry.format_metrics());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("peer-demo")
        .version("0.1")
        .author("zero.fx labs ltd.")
        .about("Exchanges pings between two in-process peers and prints their metrics")
        .arg(
            Arg::with_name("messages")
                .short("n")
                .long("messages")
                .value_name("MESSAGES")
                .takes_value(true)
                .default_value("10"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("CONFIG")
                .takes_value(true)
                .required(false),
        )
        .get_matches();

    let messages = value_t!(matches.value_of("messages"), u64).unwrap_or_else(|e| e.exit());
    let settings = PeerSettings::load(matches.value_of("config"))?;

    let sys = actix::System::new();
    sys.block_on(run(messages, settings))
}
