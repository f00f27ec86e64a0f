//! Diagnostic request counters.
//!
//! Counters only observe traffic; no routing decision reads them. Totals are
//! broadcast to clients every [`BROADCAST_EVERY`] counted requests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// How many counted requests between metric broadcasts.
pub const BROADCAST_EVERY: u64 = 100;

/// What a counted request was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    CacheHit,
    CacheMiss,
    NetworkRequest,
    Error,
}

/// Atomic counters for fetch-handling traffic.
#[derive(Debug, Default)]
pub struct PerfCounters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_requests: AtomicU64,
    errors: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_requests: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    /// Requests counted toward the broadcast interval.
    pub fn total_requests(&self) -> u64 {
        self.cache_hits + self.cache_misses + self.network_requests
    }
}

impl PerfCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. Returns a snapshot when a broadcast is due.
    pub fn record(&self, kind: RequestKind) -> Option<MetricsSnapshot> {
        match kind {
            RequestKind::CacheHit => self.cache_hits.fetch_add(1, Ordering::Relaxed),
            RequestKind::CacheMiss => self.cache_misses.fetch_add(1, Ordering::Relaxed),
            RequestKind::NetworkRequest => self.network_requests.fetch_add(1, Ordering::Relaxed),
            RequestKind::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let snapshot = self.snapshot();
        let total = snapshot.total_requests();
        if total > 0 && total % BROADCAST_EVERY == 0 {
            Some(snapshot)
        } else {
            None
        }
    }

    /// Copy the current totals.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let counters = PerfCounters::new();
        counters.record(RequestKind::CacheHit);
        counters.record(RequestKind::CacheHit);
        counters.record(RequestKind::CacheMiss);
        counters.record(RequestKind::Error);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.total_requests(), 3);
    }

    #[test]
    fn test_broadcast_due_every_hundred() {
        let counters = PerfCounters::new();

        for i in 1..=(BROADCAST_EVERY as usize) {
            let due = counters.record(RequestKind::NetworkRequest);
            if i == BROADCAST_EVERY as usize {
                let snapshot = due.expect("broadcast due at the interval");
                assert_eq!(snapshot.network_requests, BROADCAST_EVERY);
            } else {
                assert!(due.is_none());
            }
        }
    }

    #[test]
    fn test_errors_do_not_trigger_broadcast() {
        let counters = PerfCounters::new();
        for _ in 0..200 {
            assert!(counters.record(RequestKind::Error).is_none());
        }
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let counters = PerfCounters::new();
        counters.record(RequestKind::CacheHit);

        let value = serde_json::to_value(counters.snapshot()).unwrap();
        assert_eq!(value["cacheHits"], 1);
        assert_eq!(value["networkRequests"], 0);
    }
}
