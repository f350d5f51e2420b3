//! Peer connection layer of a zero.fx node.
//!
//! A [`p2p::Peer`] owns one multiplexed [`transport::Connection`] to a remote
//! node, polls its streams, decodes inbound bytes into typed messages and hands
//! them to the [`p2p::Reactor`] registered for the stream. Outbound messages go
//! through [`p2p::Peer::send`] / [`p2p::Peer::try_send`], which account the
//! encoded bytes per message type until the metrics reporter drains them.
#[macro_use]
extern crate derive_more;

pub mod metrics;
pub mod node_id;
pub mod p2p;
pub mod settings;
pub mod transport;

use p2p::StreamId;

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "io error: {}", _0)]
    IO(std::io::Error),
    #[display(fmt = "codec error: {}", _0)]
    Codec(bincode::Error),
    #[display(fmt = "config error: {}", _0)]
    Config(config::ConfigError),

    // peer errors
    /// The remote sent bytes that do not decode into the message type negotiated for the stream
    #[display(fmt = "protocol violation on stream {:#04x}: {}", stream_id, reason)]
    ProtocolViolation { stream_id: StreamId, reason: String },
    /// The transport failed while reading from a stream
    #[display(fmt = "transport error on stream {:#04x}: {}", stream_id, error)]
    Transport { stream_id: StreamId, error: std::io::Error },
    /// A wire wrapper did not contain a message of the expected kind
    #[display(fmt = "unwrap error: {}", _0)]
    Unwrap(String),

    // lifecycle errors
    AlreadyStarted,
    AlreadyStopped,
    NotStarted,

    /// Error caused by converting from a `String` to a `NodeId`
    TryFromStringError,
    /// Error when parsing a peer address `ID@IP:PORT`
    PeerParseError,
    #[display(fmt = "invalid node info: {}", _0)]
    InvalidNodeInfo(String),
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Codec(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
