//! Reads inbound messages from every routed stream and hands them to their reactors.
use super::Peer;

use crate::p2p::reactor::DispatchTable;
use crate::p2p::stream::{
    StreamDescriptor, StreamId, DEFAULT_PRIORITY, DEFAULT_RECV_MESSAGE_CAPACITY,
};
use crate::{Error, Result};

use tracing::{debug, warn};

use std::cmp::Reverse;
use std::sync::Arc;

/// A routed stream and its reusable read buffer.
struct StreamReader {
    id: StreamId,
    buf: Vec<u8>,
}

/// Readers for every routed stream, highest priority first (ties by stream id).
fn stream_readers(dispatch: &DispatchTable, descs: &[StreamDescriptor]) -> Vec<StreamReader> {
    let mut ordered: Vec<(i32, StreamId, usize)> = dispatch
        .stream_ids()
        .into_iter()
        .map(|id| match descs.iter().find(|desc| desc.id == id) {
            Some(desc) => (desc.priority, id, desc.recv_message_capacity),
            None => (DEFAULT_PRIORITY, id, DEFAULT_RECV_MESSAGE_CAPACITY),
        })
        .collect();
    ordered.sort_by_key(|(priority, id, _)| (Reverse(*priority), *id));
    ordered
        .into_iter()
        .map(|(_, id, capacity)| StreamReader { id, buf: vec![0; capacity] })
        .collect()
}

pub(super) async fn run(peer: Arc<Peer>) {
    let token = peer.token.clone();
    let mut readers = stream_readers(&peer.dispatch, &peer.stream_descs);
    let idle_poll_interval = peer.settings.idle_poll_interval();
    debug!("read loop started, polling {} streams", readers.len());

    loop {
        let mut idle = true;
        for reader in readers.iter_mut() {
            let read = tokio::select! {
                _ = token.cancelled() => break,
                read = peer.conn.read(reader.id, &mut reader.buf) => read,
            };
            match read {
                Ok(0) => continue,
                Ok(n) => {
                    idle = false;
                    if let Err(err) = deliver(&peer, reader.id, &reader.buf[..n]).await {
                        peer.fail(err);
                        return;
                    }
                }
                Err(error) => {
                    if token.is_cancelled() {
                        break;
                    }
                    warn!("error reading from stream {:#04x}: {}", reader.id, error);
                    peer.fail(Error::Transport { stream_id: reader.id, error });
                    return;
                }
            }
        }

        if token.is_cancelled() {
            break;
        }
        if idle {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(idle_poll_interval) => {}
            }
        }
    }
    debug!("read loop exited");
}

/// Decodes `bytes` for the stream's reactor, accounts them and awaits the reactor.
async fn deliver(peer: &Arc<Peer>, stream_id: StreamId, bytes: &[u8]) -> Result<()> {
    let entry = match peer.dispatch.get(stream_id) {
        Some(entry) => entry,
        None => return Ok(()),
    };
    let delivery = entry.deliver(peer.clone(), stream_id, bytes)?;
    peer.pending_metrics.add_pending_recv_bytes(&delivery.label, bytes.len());
    delivery.receive.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::p2p::test_util::{Ping, RecordingReactor};

    #[test]
    fn test_stream_readers_follow_priority() {
        let reactor = Arc::new(RecordingReactor::<Ping>::new());
        let dispatch = DispatchTable::new()
            .route::<Ping>(0x40, reactor.clone())
            .route::<Ping>(0x30, reactor.clone())
            .route::<Ping>(0x22, reactor.clone())
            .route::<Ping>(0x20, reactor);
        let descs = vec![
            StreamDescriptor::new(0x20, "consensus").with_priority(10),
            StreamDescriptor::new(0x22, "votes").with_priority(10),
            StreamDescriptor::new(0x30, "mempool").with_priority(5).with_recv_message_capacity(64),
        ];

        let readers = stream_readers(&dispatch, &descs);
        let ids: Vec<StreamId> = readers.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0x20, 0x22, 0x30, 0x40]);
        assert_eq!(readers[2].buf.len(), 64);
        assert_eq!(readers[3].buf.len(), DEFAULT_RECV_MESSAGE_CAPACITY);
    }
}
