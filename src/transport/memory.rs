use super::{ChannelStatus, Connection, ConnectionStatus, FlowStatus, SafeFuture};

use crate::p2p::{StreamDescriptor, StreamId};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Messages queued for one side of a `MemoryConnection`, per stream.
#[derive(Default)]
struct Inbox {
    queues: Mutex<HashMap<StreamId, VecDeque<Bytes>>>,
    closed: AtomicBool,
}

impl Inbox {
    fn new(descriptors: &[StreamDescriptor]) -> Self {
        let queues = descriptors.iter().map(|desc| (desc.id, VecDeque::new())).collect();
        Inbox { queues: Mutex::new(queues), closed: AtomicBool::new(false) }
    }

    fn queued(&self, stream_id: StreamId) -> usize {
        self.queues.lock().get(&stream_id).map_or(0, |q| q.len())
    }

    fn clear(&self) {
        for queue in self.queues.lock().values_mut() {
            queue.clear();
        }
    }
}

/// In-process connection: each `write` on one end becomes exactly one `read` on the other.
///
/// There is no framing or rate limiting; a read with nothing queued returns `Ok(0)`
/// immediately. Once closed, reads fail after the queue has been drained and writes fail.
pub struct MemoryConnection {
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    descriptors: Vec<StreamDescriptor>,
    inbound: Arc<Inbox>,
    outbound: Arc<Inbox>,
    write_deadline: Mutex<Option<Instant>>,
    established: Instant,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl MemoryConnection {
    /// Creates both ends of a connection carrying the streams in `descriptors`.
    pub fn pair(
        a: SocketAddr,
        b: SocketAddr,
        descriptors: &[StreamDescriptor],
    ) -> (MemoryConnection, MemoryConnection) {
        let a_inbox = Arc::new(Inbox::new(descriptors));
        let b_inbox = Arc::new(Inbox::new(descriptors));
        let a_end = MemoryConnection::new(a, b, descriptors, a_inbox.clone(), b_inbox.clone());
        let b_end = MemoryConnection::new(b, a, descriptors, b_inbox, a_inbox);
        (a_end, b_end)
    }

    fn new(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        descriptors: &[StreamDescriptor],
        inbound: Arc<Inbox>,
        outbound: Arc<Inbox>,
    ) -> Self {
        MemoryConnection {
            local_addr,
            remote_addr,
            descriptors: descriptors.to_vec(),
            inbound,
            outbound,
            write_deadline: Mutex::new(None),
            established: Instant::now(),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Queues raw bytes to be read from `stream_id` on this end, as if the remote wrote them.
    pub fn push(&self, stream_id: StreamId, bytes: &[u8]) -> io::Result<()> {
        self.enqueue(&self.inbound, stream_id, bytes)
    }

    /// Number of messages on `stream_id` waiting to be read by this end.
    pub fn pending(&self, stream_id: StreamId) -> usize {
        self.inbound.queued(stream_id)
    }

    /// The last deadline passed to `set_write_deadline`.
    pub fn write_deadline(&self) -> Option<Instant> {
        *self.write_deadline.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.inbound.closed.load(Ordering::SeqCst)
    }

    fn enqueue(&self, inbox: &Inbox, stream_id: StreamId, bytes: &[u8]) -> io::Result<()> {
        if inbox.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"));
        }
        match inbox.queues.lock().get_mut(&stream_id) {
            Some(queue) => {
                queue.push_back(Bytes::copy_from_slice(bytes));
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown stream {:#04x}", stream_id),
            )),
        }
    }

    fn dequeue(&self, stream_id: StreamId, buf: &mut [u8]) -> io::Result<usize> {
        let next = self.inbound.queues.lock().get_mut(&stream_id).and_then(|q| q.pop_front());
        match next {
            Some(msg) if msg.len() > buf.len() => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("message of {} bytes exceeds read buffer of {}", msg.len(), buf.len()),
            )),
            Some(msg) => {
                buf[..msg.len()].copy_from_slice(&msg);
                self.bytes_received.fetch_add(msg.len() as u64, Ordering::Relaxed);
                Ok(msg.len())
            }
            None if self.inbound.closed.load(Ordering::SeqCst) => {
                Err(io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed"))
            }
            None => Ok(0),
        }
    }
}

impl Connection for MemoryConnection {
    fn read<'a>(
        &'a self,
        stream_id: StreamId,
        buf: &'a mut [u8],
    ) -> SafeFuture<'a, io::Result<usize>> {
        let result = self.dequeue(stream_id, buf);
        Box::pin(async move { result })
    }

    fn write<'a>(
        &'a self,
        stream_id: StreamId,
        bytes: &'a [u8],
    ) -> SafeFuture<'a, io::Result<usize>> {
        let result = self.enqueue(&self.outbound, stream_id, bytes).map(|()| {
            self.bytes_sent.fetch_add(bytes.len() as u64, Ordering::Relaxed);
            bytes.len()
        });
        Box::pin(async move { result })
    }

    fn set_write_deadline(&self, deadline: Instant) {
        *self.write_deadline.lock() = Some(deadline);
    }

    fn close(&self, reason: &str) {
        debug!("closing memory connection {} -> {}: {}", self.local_addr, self.remote_addr, reason);
        for inbox in [&self.inbound, &self.outbound] {
            inbox.closed.store(true, Ordering::SeqCst);
            inbox.clear();
        }
    }

    fn flush_and_close<'a>(&'a self, reason: &'a str) -> SafeFuture<'a, ()> {
        Box::pin(async move {
            // writes are handed over synchronously, so the remote keeps what is queued
            debug!(
                "flushing memory connection {} -> {}: {}",
                self.local_addr, self.remote_addr, reason
            );
            self.outbound.closed.store(true, Ordering::SeqCst);
            self.inbound.closed.store(true, Ordering::SeqCst);
            self.inbound.clear();
        })
    }

    fn status(&self) -> ConnectionStatus {
        let channels = self
            .descriptors
            .iter()
            .map(|desc| ChannelStatus {
                id: desc.id,
                send_queue_capacity: desc.send_queue_capacity,
                send_queue_size: self.outbound.queued(desc.id),
                priority: desc.priority,
                recently_sent: 0,
            })
            .collect();
        ConnectionStatus {
            duration: self.established.elapsed(),
            send_monitor: FlowStatus {
                bytes: self.bytes_sent.load(Ordering::Relaxed),
                ..Default::default()
            },
            recv_monitor: FlowStatus {
                bytes: self.bytes_received.load(Ordering::Relaxed),
                ..Default::default()
            },
            channels,
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
