use super::peer::Peer;

use crate::Error;

use actix::Recipient;
use tracing::warn;

use std::sync::Arc;

/// Called after a peer stopped because of an unrecoverable fault.
pub type OnPeerError = Arc<dyn Fn(&Arc<Peer>, Error) + Send + Sync>;

/// A peer fault delivered to an actor, e.g. the switch owning the peer set.
#[derive(Debug, actix::Message)]
#[rtype(result = "()")]
pub struct PeerErrored {
    pub peer: Arc<Peer>,
    pub error: Error,
}

/// Forwards peer faults to `recipient`'s mailbox.
pub fn on_peer_error_recipient(recipient: Recipient<PeerErrored>) -> OnPeerError {
    Arc::new(move |peer: &Arc<Peer>, error: Error| {
        if let Err(err) = recipient.do_send(PeerErrored { peer: peer.clone(), error }) {
            warn!("{} error could not be delivered: {}", peer, err);
        }
    })
}
