use parking_lot::Mutex;

use std::collections::HashMap;

/// Bytes sent and received for one message type since the last flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingBytes {
    pub send: u64,
    pub recv: u64,
}

/// Per message type byte counts accumulated between two metrics reports.
///
/// Written by the send path and the read loop, drained by the metrics reporter.
/// Every operation holds the lock for at most one pass over the distinct message
/// types seen, independent of traffic volume.
#[derive(Debug, Default)]
pub struct PendingMetricsCache {
    per_message: Mutex<HashMap<String, PendingBytes>>,
}

impl PendingMetricsCache {
    pub fn new() -> Self {
        PendingMetricsCache { per_message: Mutex::new(HashMap::new()) }
    }

    pub fn add_pending_send_bytes(&self, label: &str, bytes: usize) {
        self.with_entry(label, |entry| entry.send += bytes as u64);
    }

    pub fn add_pending_recv_bytes(&self, label: &str, bytes: usize) {
        self.with_entry(label, |entry| entry.recv += bytes as u64);
    }

    fn with_entry(&self, label: &str, f: impl FnOnce(&mut PendingBytes)) {
        let mut per_message = self.per_message.lock();
        match per_message.get_mut(label) {
            Some(entry) => f(entry),
            None => {
                let mut entry = PendingBytes::default();
                f(&mut entry);
                per_message.insert(label.to_owned(), entry);
            }
        }
    }

    /// Hands every nonzero entry to `report` and zeroes it, in one critical section.
    ///
    /// Entries are kept once seen so the next add for the label does not allocate.
    pub fn flush(&self, mut report: impl FnMut(&str, PendingBytes)) {
        let mut per_message = self.per_message.lock();
        for (label, entry) in per_message.iter_mut() {
            if entry.send > 0 || entry.recv > 0 {
                report(label, *entry);
                *entry = PendingBytes::default();
            }
        }
    }

    pub fn get(&self, label: &str) -> PendingBytes {
        self.per_message.lock().get(label).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<String, PendingBytes> {
        self.per_message.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn test_add_and_get() {
        let cache = PendingMetricsCache::new();
        cache.add_pending_send_bytes("consensus_Vote", 10);
        cache.add_pending_send_bytes("consensus_Vote", 5);
        cache.add_pending_recv_bytes("consensus_Vote", 7);
        cache.add_pending_recv_bytes("mempool_Txs", 3);

        assert_eq!(cache.get("consensus_Vote"), PendingBytes { send: 15, recv: 7 });
        assert_eq!(cache.get("mempool_Txs"), PendingBytes { send: 0, recv: 3 });
        assert_eq!(cache.get("unknown"), PendingBytes::default());
    }

    #[test]
    fn test_flush_reports_nonzero_and_resets() {
        let cache = PendingMetricsCache::new();
        cache.add_pending_send_bytes("a", 4);
        cache.add_pending_recv_bytes("b", 9);

        let mut reported = HashMap::new();
        cache.flush(|label, bytes| {
            reported.insert(label.to_owned(), bytes);
        });
        assert_eq!(reported.len(), 2);
        assert_eq!(reported["a"], PendingBytes { send: 4, recv: 0 });
        assert_eq!(reported["b"], PendingBytes { send: 0, recv: 9 });

        // a second flush has nothing to report and every entry reads zero
        let mut calls = 0;
        cache.flush(|_, _| calls += 1);
        assert_eq!(calls, 0);
        assert!(cache.snapshot().values().all(|bytes| *bytes == PendingBytes::default()));
    }

    #[test]
    fn test_concurrent_adds_and_flushes_lose_nothing() {
        let cache = Arc::new(PendingMetricsCache::new());
        let writers: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|label| {
                let cache = cache.clone();
                let label = label.to_string();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        cache.add_pending_send_bytes(&label, 3);
                        cache.add_pending_recv_bytes(&label, 1);
                    }
                })
            })
            .collect();

        let mut total = PendingBytes::default();
        for _ in 0..50 {
            cache.flush(|_, bytes| {
                total.send += bytes.send;
                total.recv += bytes.recv;
            });
        }
        for w in writers {
            w.join().unwrap();
        }
        cache.flush(|_, bytes| {
            total.send += bytes.send;
            total.recv += bytes.recv;
        });

        assert_eq!(total, PendingBytes { send: 4 * 1000 * 3, recv: 4 * 1000 });
    }
}
