use super::net_address::NetAddress;
use super::stream::StreamId;

use crate::node_id::NodeId;
use crate::{Error, Result};

use serde::{Deserialize, Serialize};

use std::collections::HashSet;
use std::net::SocketAddr;

/// Upper bound on the number of streams a node may advertise.
pub const MAX_NUM_CHANNELS: usize = 16;

/// Protocol versions negotiated during the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub p2p: u64,
    pub block: u64,
    pub app: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfoOther {
    /// `"on"`, `"off"` or empty.
    pub tx_index: String,
    pub rpc_address: String,
}

/// What a remote node told us about itself during the handshake. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub protocol_version: ProtocolVersion,
    pub id: NodeId,
    /// The address the node claims to accept connections on (`IP:PORT`).
    pub listen_addr: String,
    /// Chain the node participates in.
    pub network: String,
    /// Software version.
    pub version: String,
    /// Streams the node implements.
    pub channels: Vec<StreamId>,
    pub moniker: String,
    pub other: NodeInfoOther,
}

impl NodeInfo {
    pub fn new(id: NodeId, listen_addr: &str, network: &str, channels: Vec<StreamId>) -> Self {
        NodeInfo {
            protocol_version: ProtocolVersion::default(),
            id,
            listen_addr: listen_addr.to_owned(),
            network: network.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            channels,
            moniker: id.to_string(),
            other: NodeInfoOther::default(),
        }
    }

    pub fn with_moniker(mut self, moniker: &str) -> Self {
        self.moniker = moniker.to_owned();
        self
    }

    /// The self-reported address, combined with the node's id.
    pub fn net_address(&self) -> Result<NetAddress> {
        let addr: SocketAddr = self.listen_addr.parse().map_err(|_| Error::PeerParseError)?;
        Ok(NetAddress::new(self.id, addr))
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.len() > MAX_NUM_CHANNELS {
            return Err(Error::InvalidNodeInfo(format!(
                "{} channels is more than the maximum of {}",
                self.channels.len(),
                MAX_NUM_CHANNELS
            )));
        }
        let mut seen = HashSet::new();
        for ch in self.channels.iter() {
            if !seen.insert(ch) {
                return Err(Error::InvalidNodeInfo(format!("duplicate channel {:#04x}", ch)));
            }
        }
        if self.moniker.trim().is_empty() {
            return Err(Error::InvalidNodeInfo("empty moniker".to_owned()));
        }
        match self.other.tx_index.as_str() {
            "" | "on" | "off" => Ok(()),
            other => Err(Error::InvalidNodeInfo(format!("invalid tx_index {:?}", other))),
        }
    }
}
