//! Operational counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational metrics for monitoring server activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Connections accepted (before the TLS handshake).
    pub connections_total: AtomicU64,
    /// `list` requests answered.
    pub lists_total: AtomicU64,
    /// Pushes committed.
    pub pushes_total: AtomicU64,
    /// Pulls fully served.
    pub pulls_total: AtomicU64,
    /// Payload bytes received by pushes.
    pub bytes_received: AtomicU64,
    /// Payload bytes sent by pulls.
    pub bytes_sent: AtomicU64,
    /// Connections that ended in an error.
    pub errors_total: AtomicU64,
}

/// Point-in-time copy of [`ServerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// See [`ServerMetrics::connections_total`].
    pub connections_total: u64,
    /// See [`ServerMetrics::lists_total`].
    pub lists_total: u64,
    /// See [`ServerMetrics::pushes_total`].
    pub pushes_total: u64,
    /// See [`ServerMetrics::pulls_total`].
    pub pulls_total: u64,
    /// See [`ServerMetrics::bytes_received`].
    pub bytes_received: u64,
    /// See [`ServerMetrics::bytes_sent`].
    pub bytes_sent: u64,
    /// See [`ServerMetrics::errors_total`].
    pub errors_total: u64,
}

impl ServerMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            lists_total: self.lists_total.load(Ordering::Relaxed),
            pushes_total: self.pushes_total.load(Ordering::Relaxed),
            pulls_total: self.pulls_total.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
        }
    }
}
