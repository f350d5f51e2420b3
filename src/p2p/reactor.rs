use super::message::{self, Message};
use super::peer::Peer;
use super::stream::StreamId;

use crate::{Error, Result};

use futures::future::BoxFuture;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A decoded message on its way from a peer's read loop to a reactor.
#[derive(Debug)]
pub struct Envelope<T> {
    pub channel_id: StreamId,
    pub src: Arc<Peer>,
    pub message: T,
}

/// A protocol handler owning one or more streams.
///
/// `receive` is awaited by the peer's read loop before the next read, so a slow
/// reactor slows down reads from that peer.
pub trait Reactor<T: Message>: Send + Sync {
    // === async fn receive(&self, envelope: Envelope<T>);
    fn receive(&self, envelope: Envelope<T>) -> BoxFuture<'_, ()>;
}

/// Result of decoding a message for a route: its label and the pending reactor call.
pub(crate) struct Delivery<'a> {
    pub label: String,
    pub receive: BoxFuture<'a, ()>,
}

/// Decodes the stream's message type and hands it to its reactor.
trait Route: Send + Sync {
    fn message_type(&self) -> &'static str;

    fn deliver<'a>(
        &'a self,
        src: Arc<Peer>,
        stream_id: StreamId,
        bytes: &[u8],
    ) -> Result<Delivery<'a>>;
}

struct TypedRoute<T: Message> {
    reactor: Arc<dyn Reactor<T>>,
}

impl<T: Message> Route for TypedRoute<T> {
    fn message_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn deliver<'a>(
        &'a self,
        src: Arc<Peer>,
        stream_id: StreamId,
        bytes: &[u8],
    ) -> Result<Delivery<'a>> {
        let message: T = message::decode(bytes).map_err(|err| Error::ProtocolViolation {
            stream_id,
            reason: format!("decoding {}: {}", self.message_type(), err),
        })?;
        let label = message.type_label();
        let envelope = Envelope { channel_id: stream_id, src, message };
        Ok(Delivery { label, receive: self.reactor.receive(envelope) })
    }
}

/// Routing for one stream: the reactor and the message type it expects.
pub struct DispatchEntry {
    route: Box<dyn Route>,
}

impl DispatchEntry {
    pub fn new<T: Message>(reactor: Arc<dyn Reactor<T>>) -> Self {
        DispatchEntry { route: Box::new(TypedRoute { reactor }) }
    }

    /// Rust type name of the messages carried on the stream.
    pub fn message_type(&self) -> &'static str {
        self.route.message_type()
    }

    pub(crate) fn deliver<'a>(
        &'a self,
        src: Arc<Peer>,
        stream_id: StreamId,
        bytes: &[u8],
    ) -> Result<Delivery<'a>> {
        self.route.deliver(src, stream_id, bytes)
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DispatchEntry").field("message_type", &self.message_type()).finish()
    }
}

/// Maps stream ids to their `DispatchEntry`. Built once before the peer starts and
/// never changed afterwards, so the read loop uses it without locking.
#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: HashMap<StreamId, DispatchEntry>,
}

impl DispatchTable {
    pub fn new() -> Self {
        DispatchTable { entries: HashMap::new() }
    }

    /// Routes messages of type `T` arriving on `stream_id` to `reactor`.
    pub fn route<T: Message>(mut self, stream_id: StreamId, reactor: Arc<dyn Reactor<T>>) -> Self {
        self.entries.insert(stream_id, DispatchEntry::new(reactor));
        self
    }

    pub fn get(&self, stream_id: StreamId) -> Option<&DispatchEntry> {
        self.entries.get(&stream_id)
    }

    pub fn contains(&self, stream_id: StreamId) -> bool {
        self.entries.contains_key(&stream_id)
    }

    /// Routed stream ids in ascending order.
    pub fn stream_ids(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
