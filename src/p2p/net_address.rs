use crate::node_id::NodeId;
use crate::{Error, Result};

use serde::{Deserialize, Serialize};

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// A node's network address together with the identity expected at that address.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NetAddress {
    /// The id of the node listening at this address.
    pub id: NodeId,
    pub ip: IpAddr,
    pub port: u16,
}

impl NetAddress {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        NetAddress { id, ip: addr.ip(), port: addr.port() }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.socket_addr())
    }
}

impl FromStr for NetAddress {
    type Err = Error;

    /// Parses an address of the form `ID@IP:PORT`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('@').collect();
        if parts.len() != 2 {
            return Err(Error::PeerParseError);
        }
        let id: NodeId = parts[0].parse().map_err(|_| Error::PeerParseError)?;
        let addr: SocketAddr = parts[1].parse().map_err(|_| Error::PeerParseError)?;
        Ok(NetAddress::new(id, addr))
    }
}
