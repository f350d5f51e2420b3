use super::pending_metrics::PendingMetricsCache;

use crate::metrics::{Metrics, MESSAGE_TYPE_LABEL, PEER_ID_LABEL};
use crate::node_id::NodeId;
use crate::transport::Connection;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use std::sync::Arc;
use std::time::Duration;

/// Periodically samples a peer's connection and drains its pending metrics.
///
/// A peer owns one reporter; manual ticks and the background task share its baseline,
/// so rate limiter sleep time is counted once whoever ticks.
pub struct MetricsReporter {
    peer_id: String,
    conn: Arc<dyn Connection>,
    pending: Arc<PendingMetricsCache>,
    metrics: Metrics,
    period: Duration,
    // cumulative (send, recv) sleep times seen by the previous tick
    last_sleep: Mutex<(Duration, Duration)>,
}

impl MetricsReporter {
    pub fn new(
        peer_id: NodeId,
        conn: Arc<dyn Connection>,
        pending: Arc<PendingMetricsCache>,
        metrics: Metrics,
        period: Duration,
    ) -> Self {
        MetricsReporter {
            peer_id: peer_id.to_string(),
            conn,
            pending,
            metrics,
            period,
            last_sleep: Mutex::new((Duration::ZERO, Duration::ZERO)),
        }
    }

    /// Reports queue depth, rate limiter sleep time since the previous tick and the bytes
    /// accumulated per message type, then zeroes the accumulated bytes.
    pub fn tick(&self) {
        let peer_labels = [(PEER_ID_LABEL, self.peer_id.as_str())];
        {
            // held across the status read
            let mut last_sleep = self.last_sleep.lock();
            let status = self.conn.status();
            self.metrics
                .peer_pending_send_bytes
                .set(&peer_labels, status.send_queue_size() as f64);

            let send_sleep = status.send_monitor.sleep_time;
            let recv_sleep = status.recv_monitor.sleep_time;
            self.metrics
                .send_rate_limiter_delay
                .add(&peer_labels, send_sleep.saturating_sub(last_sleep.0).as_secs_f64());
            self.metrics
                .recv_rate_limiter_delay
                .add(&peer_labels, recv_sleep.saturating_sub(last_sleep.1).as_secs_f64());
            *last_sleep = (send_sleep, recv_sleep);
        }

        let metrics = &self.metrics;
        self.pending.flush(|label, bytes| {
            let labels = [(MESSAGE_TYPE_LABEL, label)];
            if bytes.send > 0 {
                metrics.message_send_bytes_total.add(&labels, bytes.send as f64);
            }
            if bytes.recv > 0 {
                metrics.message_receive_bytes_total.add(&labels, bytes.recv as f64);
            }
        });
    }

    /// Ticks every period until `token` is cancelled, then once more so bytes accounted
    /// since the last period are not lost.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut interval =
            tokio::time::interval_at(tokio::time::Instant::now() + self.period, self.period);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => self.tick(),
            }
        }
        self.tick();
        debug!("metrics reporter exited");
    }
}
