//! The multiplexed connection a `Peer` reads from and writes to.
//!
//! The socket multiplexer itself (framing, rate limiting, secret connection)
//! lives outside this crate; `Connection` is the seam it plugs into. The
//! in-process `MemoryConnection` is provided for tests and local wiring.
mod memory;

pub use memory::MemoryConnection;

use crate::p2p::StreamId;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Future type that can be safely held across `.await` boundaries
/// and is compatible with Tokio
pub type SafeFuture<'a, Out> = Pin<Box<dyn Send + Future<Output = Out> + 'a>>;

pub trait Connection: Send + Sync {
    // === async fn read(&self, stream_id: StreamId, buf: &mut [u8]) -> io::Result<usize>;
    /// Reads the next message queued on `stream_id` into `buf`. `Ok(0)` means nothing is
    /// queued right now; an error means the connection can no longer be read from.
    fn read<'a>(&'a self, stream_id: StreamId, buf: &'a mut [u8])
        -> SafeFuture<'a, io::Result<usize>>;

    // === async fn write(&self, stream_id: StreamId, bytes: &[u8]) -> io::Result<usize>;
    fn write<'a>(&'a self, stream_id: StreamId, bytes: &'a [u8])
        -> SafeFuture<'a, io::Result<usize>>;

    fn set_write_deadline(&self, deadline: Instant);

    /// Closes the connection immediately, dropping anything not yet written.
    fn close(&self, reason: &str);

    // === async fn flush_and_close(&self, reason: &str);
    /// Waits for in-flight writes to be handed to the remote, then closes.
    fn flush_and_close<'a>(&'a self, reason: &'a str) -> SafeFuture<'a, ()>;

    fn status(&self) -> ConnectionStatus;

    fn local_addr(&self) -> SocketAddr;

    fn remote_addr(&self) -> SocketAddr;
}

/// Snapshot of a connection's queues and rate limiters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStatus {
    pub duration: Duration,
    pub send_monitor: FlowStatus,
    pub recv_monitor: FlowStatus,
    pub channels: Vec<ChannelStatus>,
}

impl ConnectionStatus {
    /// Total number of messages waiting in the send queues of all streams.
    pub fn send_queue_size(&self) -> usize {
        self.channels.iter().map(|ch| ch.send_queue_size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowStatus {
    /// Bytes transferred since the connection was established.
    pub bytes: u64,
    /// Cumulative time the rate limiter has slept.
    pub sleep_time: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelStatus {
    pub id: StreamId,
    pub send_queue_capacity: usize,
    pub send_queue_size: usize,
    pub priority: i32,
    pub recently_sent: u64,
}
