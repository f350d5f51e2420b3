//! Messages, reactors and connections shared by the peer tests.
use super::message::{Message, PlainMessage};
use super::net_address::NetAddress;
use super::node_info::NodeInfo;
use super::peer::Peer;
use super::reactor::{DispatchTable, Envelope, Reactor};
use super::stream::{StreamDescriptor, StreamId};

use crate::node_id::NodeId;
use crate::settings::PeerSettings;
use crate::transport::{ChannelStatus, Connection, ConnectionStatus, MemoryConnection, SafeFuture};
use crate::{Error, Result};

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use std::borrow::Cow;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub nonce: u64,
    pub payload: Vec<u8>,
}

impl PlainMessage for Ping {}

/// A message whose serialization always fails.
#[derive(Debug, Clone, Deserialize)]
pub struct Unencodable;

impl Serialize for Unencodable {
    fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Err(S::Error::custom("unencodable message"))
    }
}

impl PlainMessage for Unencodable {}

/// Several consensus messages multiplexed onto `ConsensusWire`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsensusMessage {
    NewRoundStep { height: u64, round: u32 },
    Vote { height: u64, round: u32, signature: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConsensusSum {
    NewRoundStep { height: u64, round: u32 },
    Vote { height: u64, round: u32, signature: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusWire {
    pub sum: Option<ConsensusSum>,
}

impl Message for ConsensusMessage {
    type Wire = ConsensusWire;

    fn wrap(&self) -> Cow<'_, ConsensusWire> {
        let sum = match self.clone() {
            ConsensusMessage::NewRoundStep { height, round } => {
                ConsensusSum::NewRoundStep { height, round }
            }
            ConsensusMessage::Vote { height, round, signature } => {
                ConsensusSum::Vote { height, round, signature }
            }
        };
        Cow::Owned(ConsensusWire { sum: Some(sum) })
    }

    fn unwrap(wire: ConsensusWire) -> Result<Self> {
        match wire.sum {
            Some(ConsensusSum::NewRoundStep { height, round }) => {
                Ok(ConsensusMessage::NewRoundStep { height, round })
            }
            Some(ConsensusSum::Vote { height, round, signature }) => {
                Ok(ConsensusMessage::Vote { height, round, signature })
            }
            None => Err(Error::Unwrap("empty consensus message".to_owned())),
        }
    }

    fn type_label(&self) -> String {
        match self {
            ConsensusMessage::NewRoundStep { .. } => "consensus_NewRoundStep".to_owned(),
            ConsensusMessage::Vote { .. } => "consensus_Vote".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Received<T> {
    pub channel_id: StreamId,
    pub src: NodeId,
    pub message: T,
}

/// Records every envelope it receives.
pub struct RecordingReactor<T> {
    received: Mutex<Vec<Received<T>>>,
}

impl<T: Message + Clone> RecordingReactor<T> {
    pub fn new() -> Self {
        RecordingReactor { received: Mutex::new(vec![]) }
    }

    pub fn received(&self) -> Vec<Received<T>> {
        self.received.lock().clone()
    }

    /// Waits until at least `n` envelopes arrived, failing the test after five seconds.
    pub async fn wait_for(&self, n: usize) -> Vec<Received<T>> {
        let waiting = async {
            loop {
                if self.received.lock().len() >= n {
                    return self.received();
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap_or_else(|_| panic!("reactor did not receive {} messages", n))
    }
}

impl<T: Message + Clone> Reactor<T> for RecordingReactor<T> {
    fn receive(&self, envelope: Envelope<T>) -> BoxFuture<'_, ()> {
        self.received.lock().push(Received {
            channel_id: envelope.channel_id,
            src: envelope.src.id(),
            message: envelope.message,
        });
        future::ready(()).boxed()
    }
}

/// How a `StubConnection` answers writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteBehaviour {
    Complete,
    /// Reports one byte less than requested.
    Partial,
    Fail,
    /// Never completes.
    Hang,
    /// Completes after the given time.
    Delay(Duration),
}

/// A scripted connection: reads find nothing (or block until closed), writes behave
/// as configured and are counted.
pub struct StubConnection {
    remote_addr: SocketAddr,
    write_behaviour: Mutex<WriteBehaviour>,
    block_reads: bool,
    closed: CancellationToken,
    writes: AtomicUsize,
    reads: AtomicUsize,
    write_deadline: Mutex<Option<Instant>>,
    status: Mutex<ConnectionStatus>,
}

impl StubConnection {
    pub fn new(remote_addr: SocketAddr) -> Self {
        StubConnection {
            remote_addr,
            write_behaviour: Mutex::new(WriteBehaviour::Complete),
            block_reads: false,
            closed: CancellationToken::new(),
            writes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            write_deadline: Mutex::new(None),
            status: Mutex::new(ConnectionStatus {
                channels: vec![ChannelStatus { id: 0x20, ..Default::default() }],
                ..Default::default()
            }),
        }
    }

    pub fn with_write_behaviour(self, behaviour: WriteBehaviour) -> Self {
        *self.write_behaviour.lock() = behaviour;
        self
    }

    /// Reads block until the connection is closed, then fail.
    pub fn with_blocking_reads(mut self) -> Self {
        self.block_reads = true;
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn write_deadline(&self) -> Option<Instant> {
        *self.write_deadline.lock()
    }

    pub fn set_status(&self, f: impl FnOnce(&mut ConnectionStatus)) {
        let mut status = self.status.lock();
        f(&mut *status);
    }
}

impl Connection for StubConnection {
    fn read<'a>(
        &'a self,
        _stream_id: StreamId,
        _buf: &'a mut [u8],
    ) -> SafeFuture<'a, io::Result<usize>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.block_reads {
            return Box::pin(future::ready(Ok(0)));
        }
        Box::pin(async move {
            self.closed.cancelled().await;
            Err(io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed"))
        })
    }

    fn write<'a>(
        &'a self,
        _stream_id: StreamId,
        bytes: &'a [u8],
    ) -> SafeFuture<'a, io::Result<usize>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let len = bytes.len();
        match *self.write_behaviour.lock() {
            WriteBehaviour::Complete => Box::pin(future::ready(Ok(len))),
            WriteBehaviour::Partial => Box::pin(future::ready(Ok(len.saturating_sub(1)))),
            WriteBehaviour::Fail => Box::pin(future::ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write failed",
            )))),
            WriteBehaviour::Hang => Box::pin(future::pending()),
            WriteBehaviour::Delay(delay) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(len)
            }),
        }
    }

    fn set_write_deadline(&self, deadline: Instant) {
        *self.write_deadline.lock() = Some(deadline);
    }

    fn close(&self, _reason: &str) {
        self.closed.cancel();
    }

    fn flush_and_close<'a>(&'a self, _reason: &'a str) -> SafeFuture<'a, ()> {
        self.closed.cancel();
        Box::pin(future::ready(()))
    }

    fn status(&self) -> ConnectionStatus {
        self.status.lock().clone()
    }

    fn local_addr(&self) -> SocketAddr {
        socket_addr(1)
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

pub fn socket_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub fn node_info(name: &[u8], port: u16, channels: Vec<StreamId>) -> NodeInfo {
    let listen_addr = socket_addr(port).to_string();
    NodeInfo::new(NodeId::new(name), &listen_addr, "test-chain", channels)
}

pub fn descriptors(ids: &[StreamId]) -> Vec<StreamDescriptor> {
    ids.iter().map(|id| StreamDescriptor::new(*id, &format!("stream-{:#04x}", id))).collect()
}

/// Both ends of a `MemoryConnection` carrying `ids`, local end first.
pub fn memory_pair(ids: &[StreamId]) -> (Arc<MemoryConnection>, Arc<MemoryConnection>) {
    let (local, remote) =
        MemoryConnection::pair(socket_addr(26656), socket_addr(26657), &descriptors(ids));
    (Arc::new(local), Arc::new(remote))
}

/// An inbound peer for the remote node `remote` over `conn`, in `Created` state.
pub fn peer_over(
    conn: Arc<dyn Connection>,
    remote: &[u8],
    channels: Vec<StreamId>,
    dispatch: DispatchTable,
) -> Peer {
    let info = node_info(remote, 26657, channels);
    let addr = NetAddress::new(info.id, conn.remote_addr());
    Peer::new(conn, info, addr, false, false, Arc::new(dispatch), PeerSettings::default())
}

/// A peer without reactors over a memory connection, and the remote end of that connection.
pub fn memory_peer(channels: Vec<StreamId>) -> (Arc<Peer>, Arc<MemoryConnection>) {
    let (local, remote) = memory_pair(&channels);
    let peer = peer_over(local, b"remote", channels, DispatchTable::new());
    (Arc::new(peer), remote)
}
