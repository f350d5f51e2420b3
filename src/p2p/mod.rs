pub mod message;
pub mod net_address;
pub mod node_info;
pub mod peer_data;
pub mod pending_metrics;
pub mod prelude;
pub mod reactor;
pub mod stream;

// `wiring` builds a `Peer` from a connection and the switch's `PeerConfig`; the peer's
// read loop hands decoded messages to the `Reactor` routed for the stream, and its
// `MetricsReporter` drains the pending metrics on every tick.
pub mod peer;
pub mod peer_error;
pub mod reporter;
pub mod wiring;

#[cfg(test)]
pub(crate) mod test_util;

pub use message::{Message, PlainMessage};
pub use net_address::NetAddress;
pub use node_info::NodeInfo;
pub use peer::{Peer, PeerState};
pub use peer_error::{on_peer_error_recipient, OnPeerError, PeerErrored};
pub use reactor::{DispatchEntry, DispatchTable, Envelope, Reactor};
pub use stream::{StreamDescriptor, StreamId};
pub use wiring::{wrap_peer, IsPersistent, PeerConfig};
