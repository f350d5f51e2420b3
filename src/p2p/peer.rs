mod read_loop;


use super::message::{self, Message};
use super::net_address::NetAddress;
use super::node_info::NodeInfo;
use super::peer_data::PeerData;
use super::peer_error::OnPeerError;
use super::pending_metrics::PendingMetricsCache;
use super::reactor::DispatchTable;
use super::reporter::MetricsReporter;
use super::stream::{StreamDescriptor, StreamId};

use crate::metrics::Metrics;
use crate::node_id::NodeId;
use crate::settings::PeerSettings;
use crate::transport::{Connection, ConnectionStatus};
use crate::{Error, Result};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use std::any::Any;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const STOP_REASON: &str = "stopping peer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// The local handle to one remote node's live connection.
///
/// A `Peer` is built in `Created` state and does no I/O until [`Peer::start`], which
/// spawns the read loop and the metrics reporter. Both run until the peer is stopped,
/// either explicitly or because the connection failed or the remote broke protocol.
pub struct Peer {
    conn: Arc<dyn Connection>,
    node_info: NodeInfo,
    // cached from `node_info` for `has_channel`
    channels: Vec<StreamId>,
    socket_addr: NetAddress,
    outbound: bool,
    persistent: bool,

    dispatch: Arc<DispatchTable>,
    stream_descs: Vec<StreamDescriptor>,
    settings: PeerSettings,

    pending_metrics: Arc<PendingMetricsCache>,
    reporter: Arc<MetricsReporter>,
    on_peer_error: Option<OnPeerError>,

    data: PeerData,
    state: Mutex<PeerState>,
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    removal_failed: AtomicBool,
}

impl Peer {
    pub fn new(
        conn: Arc<dyn Connection>,
        node_info: NodeInfo,
        socket_addr: NetAddress,
        outbound: bool,
        persistent: bool,
        dispatch: Arc<DispatchTable>,
        settings: PeerSettings,
    ) -> Self {
        let channels = node_info.channels.clone();
        let pending_metrics = Arc::new(PendingMetricsCache::new());
        let reporter = MetricsReporter::new(
            node_info.id,
            conn.clone(),
            pending_metrics.clone(),
            Metrics::nop(),
            settings.metrics_tick(),
        );
        Peer {
            conn,
            node_info,
            channels,
            socket_addr,
            outbound,
            persistent,
            dispatch,
            stream_descs: vec![],
            settings,
            pending_metrics,
            reporter: Arc::new(reporter),
            on_peer_error: None,
            data: PeerData::new(),
            state: Mutex::new(PeerState::Created),
            token: CancellationToken::new(),
            tasks: Mutex::new(vec![]),
            removal_failed: AtomicBool::new(false),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.reporter = Arc::new(MetricsReporter::new(
            self.id(),
            self.conn.clone(),
            self.pending_metrics.clone(),
            metrics,
            self.settings.metrics_tick(),
        ));
        self
    }

    /// Called with the peer and the fault after the peer stopped itself.
    pub fn with_on_peer_error(mut self, on_peer_error: OnPeerError) -> Self {
        self.on_peer_error = Some(on_peer_error);
        self
    }

    /// Descriptors used for read priority and read buffer sizes.
    pub fn with_stream_descriptors(mut self, stream_descs: Vec<StreamDescriptor>) -> Self {
        self.stream_descs = stream_descs;
        self
    }

    // -- lifecycle

    /// Spawns the read loop and the metrics reporter. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                PeerState::Created => *state = PeerState::Starting,
                PeerState::Starting | PeerState::Running => return Err(Error::AlreadyStarted),
                PeerState::Stopping | PeerState::Stopped => return Err(Error::AlreadyStopped),
            }
        }

        let span = info_span!("peer", id = %self.id(), remote = %self.remote_addr());
        let read_loop = tokio::spawn(read_loop::run(self.clone()).instrument(span.clone()));
        let token = self.token.clone();
        let reporter = tokio::spawn(self.reporter.clone().run(token).instrument(span));
        self.tasks.lock().extend(vec![read_loop, reporter]);

        let mut state = self.state.lock();
        // the read loop may already have failed and stopped the peer
        if *state == PeerState::Starting {
            *state = PeerState::Running;
            info!("{} started", self);
        }
        Ok(())
    }

    /// Closes the connection without waiting for queued writes.
    pub fn stop(&self) -> Result<()> {
        self.begin_stop()?;
        self.token.cancel();
        self.conn.close(STOP_REASON);
        self.finish_stop();
        Ok(())
    }

    /// Like `stop`, but lets the connection hand over every completed `send` first.
    pub async fn flush_stop(&self) -> Result<()> {
        self.begin_stop()?;
        self.token.cancel();
        self.conn.flush_and_close(STOP_REASON).await;
        self.finish_stop();
        Ok(())
    }

    fn begin_stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            PeerState::Created => Err(Error::NotStarted),
            PeerState::Stopping | PeerState::Stopped => Err(Error::AlreadyStopped),
            PeerState::Starting | PeerState::Running => {
                *state = PeerState::Stopping;
                Ok(())
            }
        }
    }

    fn finish_stop(&self) {
        *self.state.lock() = PeerState::Stopped;
        info!("{} stopped", self);
    }

    /// Resolves once the read loop and the metrics reporter have exited.
    pub async fn wait(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                warn!("{} background task failed: {}", self, err);
            }
        }
    }

    /// Stops the peer because of `err` and hands the fault to the error callback.
    /// A fault seen while the peer is already being stopped is only logged.
    fn fail(self: &Arc<Self>, err: Error) {
        if let Err(stop_err) = self.stop() {
            debug!("{} ignoring {} while stopping: {}", self, err, stop_err);
            return;
        }
        error!("{} failed: {}", self, err);
        if let Some(on_peer_error) = &self.on_peer_error {
            on_peer_error(self, err);
        }
    }

    pub fn state(&self) -> PeerState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PeerState::Running
    }

    // -- send

    /// Sends `msg` on `stream_id`, waiting up to the send timeout for the write to complete.
    ///
    /// Returns false if the peer is not running, the remote does not implement the stream,
    /// or the message could not be written completely in time.
    pub async fn send<T: Message>(&self, stream_id: StreamId, msg: &T) -> bool {
        self.send_within(stream_id, msg, self.settings.send_timeout()).await
    }

    /// Like `send` with the much shorter try-send timeout.
    pub async fn try_send<T: Message>(&self, stream_id: StreamId, msg: &T) -> bool {
        self.send_within(stream_id, msg, self.settings.try_send_timeout()).await
    }

    async fn send_within<T: Message>(
        &self,
        stream_id: StreamId,
        msg: &T,
        within: Duration,
    ) -> bool {
        if !self.is_running() || !self.has_channel(stream_id) {
            return false;
        }

        let label = msg.type_label();
        let bytes = match message::encode(msg) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("{} can't encode {:?}: {}", self, msg, err);
                return false;
            }
        };

        self.conn.set_write_deadline(Instant::now() + within);
        match tokio::time::timeout(within, self.conn.write(stream_id, &bytes)).await {
            Ok(Ok(n)) if n == bytes.len() => {
                self.pending_metrics.add_pending_send_bytes(&label, n);
                true
            }
            Ok(Ok(n)) => {
                error!(
                    "{} message not sent completely on stream {:#04x}: {} of {} bytes",
                    self,
                    stream_id,
                    n,
                    bytes.len()
                );
                false
            }
            Ok(Err(err)) => {
                error!("{} failed to send {:?} on stream {:#04x}: {}", self, msg, stream_id, err);
                false
            }
            Err(_) => {
                error!("{} send on stream {:#04x} timed out after {:?}", self, stream_id, within);
                false
            }
        }
    }

    // -- queries

    pub fn id(&self) -> NodeId {
        self.node_info.id
    }

    pub fn is_outbound(&self) -> bool {
        self.outbound
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn node_info(&self) -> &NodeInfo {
        &self.node_info
    }

    /// The address of the socket: the dialed address for outbound peers, the address
    /// the connection came from for inbound ones (not the self-reported one).
    pub fn socket_addr(&self) -> &NetAddress {
        &self.socket_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.conn.remote_addr()
    }

    pub fn remote_ip(&self) -> IpAddr {
        self.conn.remote_addr().ip()
    }

    /// Whether the remote reported implementing `stream_id`.
    pub fn has_channel(&self, stream_id: StreamId) -> bool {
        self.channels.iter().any(|ch| *ch == stream_id)
    }

    pub fn channels(&self) -> &[StreamId] {
        &self.channels
    }

    pub fn status(&self) -> ConnectionStatus {
        self.conn.status()
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn pending_metrics(&self) -> &PendingMetricsCache {
        &self.pending_metrics
    }

    /// The reporter draining this peer's pending metrics into its `Metrics`. It is the
    /// same reporter the background task ticks.
    pub fn metrics_reporter(&self) -> &MetricsReporter {
        &self.reporter
    }

    // -- user data

    pub fn get<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.data.get::<T>()
    }

    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        self.data.set(value)
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.data.remove::<T>()
    }

    pub fn data(&self) -> &PeerData {
        &self.data
    }

    // -- removal

    /// Marks that the owning peer set failed to remove this peer.
    pub fn set_removal_failed(&self) {
        self.removal_failed.store(true, Ordering::SeqCst);
    }

    pub fn removal_failed(&self) -> bool {
        self.removal_failed.load(Ordering::SeqCst)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let direction = if self.outbound { "out" } else { "in" };
        write!(f, "Peer{{{} {} {}}}", self.remote_addr(), self.id(), direction)
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id())
            .field("socket_addr", &self.socket_addr)
            .field("outbound", &self.outbound)
            .field("persistent", &self.persistent)
            .field("state", &self.state())
            .finish()
    }
}
