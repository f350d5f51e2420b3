use config::{Config, Environment, File};
use serde::Deserialize;

use std::time::Duration;

use crate::Result;

const ENV_PREFIX: &str = "PEER";

fn default_send_timeout_ms() -> u64 {
    10_000
}
fn default_try_send_timeout_ms() -> u64 {
    100
}
fn default_metrics_tick_ms() -> u64 {
    1_000
}
fn default_idle_poll_interval_ms() -> u64 {
    5
}

/// Timing knobs of a peer. Every field has a default, so an empty source is valid.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PeerSettings {
    /// Deadline for `Peer::send`.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Deadline for `Peer::try_send`.
    #[serde(default = "default_try_send_timeout_ms")]
    pub try_send_timeout_ms: u64,
    #[serde(default = "default_metrics_tick_ms")]
    pub metrics_tick_ms: u64,
    /// How long the read loop sleeps after a pass over all streams found nothing.
    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,
}

impl Default for PeerSettings {
    fn default() -> Self {
        PeerSettings {
            send_timeout_ms: default_send_timeout_ms(),
            try_send_timeout_ms: default_try_send_timeout_ms(),
            metrics_tick_ms: default_metrics_tick_ms(),
            idle_poll_interval_ms: default_idle_poll_interval_ms(),
        }
    }
}

impl PeerSettings {
    /// Reads settings from `path` (if given and present) and then from `PEER_*`
    /// environment variables, e.g. `PEER_SEND_TIMEOUT_MS=5000`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn try_send_timeout(&self) -> Duration {
        Duration::from_millis(self.try_send_timeout_ms)
    }

    pub fn metrics_tick(&self) -> Duration {
        Duration::from_millis(self.metrics_tick_ms)
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}
