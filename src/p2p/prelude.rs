pub use crate::{Error, Result};

pub use super::message::{Message, PlainMessage};
pub use super::node_info::NodeInfo;
pub use super::peer::{Peer, PeerState};
pub use super::reactor::{DispatchTable, Envelope, Reactor};
pub use super::stream::{StreamDescriptor, StreamId};
pub use super::wiring::{wrap_peer, PeerConfig};

pub use crate::metrics::{MemoryMetrics, Metrics};
pub use crate::node_id::NodeId;
pub use crate::settings::PeerSettings;
pub use crate::transport::{Connection, MemoryConnection};

pub use tokio::time::{timeout, Duration};

pub use std::sync::Arc;

pub use futures::future::{BoxFuture, FutureExt};

pub use tracing::{debug, error, info, warn};
