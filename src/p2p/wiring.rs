use super::net_address::NetAddress;
use super::node_info::NodeInfo;
use super::peer::Peer;
use super::peer_error::OnPeerError;
use super::reactor::DispatchTable;
use super::stream::StreamDescriptor;

use crate::metrics::Metrics;
use crate::settings::PeerSettings;
use crate::transport::Connection;

use tracing::debug;

use std::sync::Arc;

/// Decides whether the node should keep reconnecting to the node at an address.
pub type IsPersistent = Arc<dyn Fn(&NetAddress) -> bool + Send + Sync>;

/// Everything the switch shares between the peers it creates.
#[derive(Clone)]
pub struct PeerConfig {
    pub stream_descs: Vec<StreamDescriptor>,
    pub on_peer_error: Option<OnPeerError>,
    pub outbound: bool,
    pub is_persistent: Option<IsPersistent>,
    pub dispatch: Arc<DispatchTable>,
    pub metrics: Metrics,
    pub settings: PeerSettings,
}

impl PeerConfig {
    pub fn new(dispatch: Arc<DispatchTable>, stream_descs: Vec<StreamDescriptor>) -> Self {
        PeerConfig {
            stream_descs,
            on_peer_error: None,
            outbound: false,
            is_persistent: None,
            dispatch,
            metrics: Metrics::nop(),
            settings: PeerSettings::default(),
        }
    }

    fn persistent(&self, node_info: &NodeInfo, socket_addr: &NetAddress) -> bool {
        let is_persistent = match &self.is_persistent {
            Some(is_persistent) => is_persistent,
            None => return false,
        };
        if self.outbound {
            return is_persistent(socket_addr);
        }
        match node_info.net_address() {
            Ok(self_reported) => is_persistent(&self_reported),
            Err(err) => {
                debug!("ignoring self-reported address {:?}: {}", node_info.listen_addr, err);
                false
            }
        }
    }
}

/// Builds a peer for a connection whose handshake produced `node_info`. The peer is
/// returned in `Created` state; the caller starts it.
pub fn wrap_peer(
    conn: Arc<dyn Connection>,
    node_info: NodeInfo,
    config: &PeerConfig,
    socket_addr: NetAddress,
) -> Arc<Peer> {
    let persistent = config.persistent(&node_info, &socket_addr);
    let mut peer = Peer::new(
        conn,
        node_info,
        socket_addr,
        config.outbound,
        persistent,
        config.dispatch.clone(),
        config.settings.clone(),
    )
    .with_metrics(config.metrics.clone())
    .with_stream_descriptors(config.stream_descs.clone());
    if let Some(on_peer_error) = &config.on_peer_error {
        peer = peer.with_on_peer_error(on_peer_error.clone());
    }
    Arc::new(peer)
}
