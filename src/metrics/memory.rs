use super::{Counter, Gauge, Labels, Metrics};

use parking_lot::Mutex;

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

const NAMESPACE: &str = "p2p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Counter,
    Gauge,
}

impl Kind {
    fn as_str(&self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Gauge => "gauge",
        }
    }
}

type LabelSet = Vec<(String, String)>;

/// One metric name and its value per label set.
struct Family {
    name: String,
    help: &'static str,
    kind: Kind,
    values: Mutex<BTreeMap<LabelSet, f64>>,
}

impl Family {
    fn new(name: &str, help: &'static str, kind: Kind) -> Self {
        Family {
            name: format!("{}_{}", NAMESPACE, name),
            help,
            kind,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    fn update(&self, labels: &Labels, f: impl FnOnce(&mut f64)) {
        let mut key: LabelSet =
            labels.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        key.sort();
        f(self.values.lock().entry(key).or_insert(0.0));
    }

    fn value(&self, labels: &Labels) -> Option<f64> {
        let mut key: LabelSet =
            labels.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        key.sort();
        self.values.lock().get(&key).copied()
    }
}

impl Counter for Family {
    fn add(&self, labels: &Labels, value: f64) {
        self.update(labels, |v| *v += value);
    }
}

impl Gauge for Family {
    fn set(&self, labels: &Labels, value: f64) {
        self.update(labels, |v| *v = value);
    }
}

/// In-process metrics registry backing a [`Metrics`] bundle.
#[derive(Clone)]
pub struct MemoryMetrics {
    peer_pending_send_bytes: Arc<Family>,
    send_rate_limiter_delay: Arc<Family>,
    recv_rate_limiter_delay: Arc<Family>,
    message_send_bytes_total: Arc<Family>,
    message_receive_bytes_total: Arc<Family>,
}

impl Default for MemoryMetrics {
    fn default() -> Self {
        MemoryMetrics::new()
    }
}

impl MemoryMetrics {
    pub fn new() -> Self {
        MemoryMetrics {
            peer_pending_send_bytes: Arc::new(Family::new(
                "peer_pending_send_bytes",
                "Number of messages pending to be sent to a peer.",
                Kind::Gauge,
            )),
            send_rate_limiter_delay: Arc::new(Family::new(
                "send_rate_limiter_delay",
                "Time in seconds spent sleeping by the send rate limiter.",
                Kind::Counter,
            )),
            recv_rate_limiter_delay: Arc::new(Family::new(
                "recv_rate_limiter_delay",
                "Time in seconds spent sleeping by the receive rate limiter.",
                Kind::Counter,
            )),
            message_send_bytes_total: Arc::new(Family::new(
                "message_send_bytes_total",
                "Number of bytes of each message type sent.",
                Kind::Counter,
            )),
            message_receive_bytes_total: Arc::new(Family::new(
                "message_receive_bytes_total",
                "Number of bytes of each message type received.",
                Kind::Counter,
            )),
        }
    }

    /// A `Metrics` bundle recording into this registry.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            peer_pending_send_bytes: self.peer_pending_send_bytes.clone(),
            send_rate_limiter_delay: self.send_rate_limiter_delay.clone(),
            recv_rate_limiter_delay: self.recv_rate_limiter_delay.clone(),
            message_send_bytes_total: self.message_send_bytes_total.clone(),
            message_receive_bytes_total: self.message_receive_bytes_total.clone(),
        }
    }

    fn families(&self) -> [&Family; 5] {
        [
            &*self.peer_pending_send_bytes,
            &*self.send_rate_limiter_delay,
            &*self.recv_rate_limiter_delay,
            &*self.message_send_bytes_total,
            &*self.message_receive_bytes_total,
        ]
    }

    /// Current value of metric `name` (without namespace) for exactly `labels`.
    pub fn value(&self, name: &str, labels: &Labels) -> Option<f64> {
        let full_name = format!("{}_{}", NAMESPACE, name);
        self.families().iter().find(|f| f.name == full_name).and_then(|f| f.value(labels))
    }

    /// Renders every family in the Prometheus text exposition format.
    pub fn format_metrics(&self) -> String {
        let mut output = String::new();
        for family in self.families().iter() {
            let _ = writeln!(output, "# HELP {} {}", family.name, family.help);
            let _ = writeln!(output, "# TYPE {} {}", family.name, family.kind.as_str());
            for (labels, value) in family.values.lock().iter() {
                if labels.is_empty() {
                    let _ = writeln!(output, "{} {}", family.name, value);
                    continue;
                }
                let rendered: Vec<String> =
                    labels.iter().map(|(k, v)| format!("{}=\"{}\"", k, escape(v))).collect();
                let _ = writeln!(output, "{}{{{}}} {}", family.name, rendered.join(","), value);
            }
        }
        output
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
