use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// `tracing` target of the structured analytics events.
pub const ANALYTICS_TARGET: &str = "vsnet_broker::analytics";

/// Process-visible counters of one `Network` instance.
///
/// Updated while the network lock is held, read lock-free.
#[derive(Debug, Default)]
pub struct NetworkStatistics {
    connections_created: AtomicU64,
    connections_finished: AtomicU64,
    connections_closed: AtomicU64,
    distributions: AtomicU64,
    distribution_passes: AtomicU64,
    pass_limit_hits: AtomicU64,
}

/// Point-in-time copy of [`NetworkStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub connections_created: u64,
    pub connections_finished: u64,
    pub connections_closed: u64,
    pub distributions: u64,
    pub distribution_passes: u64,
    pub pass_limit_hits: u64,
}

impl NetworkStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_finished(&self) {
        self.connections_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_distribution(&self, passes: usize, hit_pass_limit: bool) {
        self.distributions.fetch_add(1, Ordering::Relaxed);
        self.distribution_passes.fetch_add(passes as u64, Ordering::Relaxed);
        if hit_pass_limit {
            self.pass_limit_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_finished: self.connections_finished.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            distributions: self.distributions.load(Ordering::Relaxed),
            distribution_passes: self.distribution_passes.load(Ordering::Relaxed),
            pass_limit_hits: self.pass_limit_hits.load(Ordering::Relaxed),
        }
    }
}
