//! Metrics emitted by peers.
//!
//! Storage and exposition are left to the backend behind the `Counter` and
//! `Gauge` traits. `MemoryMetrics` is an in-process backend that renders the
//! Prometheus text format.
mod memory;

pub use memory::MemoryMetrics;

use std::fmt;
use std::sync::Arc;

/// Label name/value pairs attached to one observation.
pub type Labels<'a> = [(&'a str, &'a str)];

pub const PEER_ID_LABEL: &str = "peer_id";
pub const MESSAGE_TYPE_LABEL: &str = "message_type";

/// A monotonically increasing value.
pub trait Counter: Send + Sync {
    fn add(&self, labels: &Labels, value: f64);
}

/// A value that may go up and down.
pub trait Gauge: Send + Sync {
    fn set(&self, labels: &Labels, value: f64);
}

struct Nop;

impl Counter for Nop {
    fn add(&self, _labels: &Labels, _value: f64) {}
}

impl Gauge for Nop {
    fn set(&self, _labels: &Labels, _value: f64) {}
}

/// The metrics a peer reports on every tick of its metrics reporter.
#[derive(Clone)]
pub struct Metrics {
    /// Messages waiting in the peer's send queues (`peer_id`).
    pub peer_pending_send_bytes: Arc<dyn Gauge>,
    /// Seconds the send rate limiter slept (`peer_id`).
    pub send_rate_limiter_delay: Arc<dyn Counter>,
    /// Seconds the receive rate limiter slept (`peer_id`).
    pub recv_rate_limiter_delay: Arc<dyn Counter>,
    /// Bytes sent per message type (`message_type`).
    pub message_send_bytes_total: Arc<dyn Counter>,
    /// Bytes received per message type (`message_type`).
    pub message_receive_bytes_total: Arc<dyn Counter>,
}

impl Metrics {
    /// Metrics that discard every observation.
    pub fn nop() -> Self {
        let nop = Arc::new(Nop);
        Metrics {
            peer_pending_send_bytes: nop.clone(),
            send_rate_limiter_delay: nop.clone(),
            recv_rate_limiter_delay: nop.clone(),
            message_send_bytes_total: nop.clone(),
            message_receive_bytes_total: nop,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::nop()
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Metrics")
    }
}
