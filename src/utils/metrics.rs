//! Observability and Metrics
//!
//! Process-wide counters shared by every session.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::Side;

/// Metrics collector for proxy operations
#[derive(Debug)]
pub struct Metrics {
    /// Total sessions accepted
    pub sessions_total: AtomicU64,
    /// Currently active sessions
    pub sessions_active: AtomicU64,
    /// Upstream connections that could not be established
    pub connect_failures: AtomicU64,
    /// Bytes received from clients
    pub bytes_from_client: AtomicU64,
    /// Bytes received from servers
    pub bytes_from_server: AtomicU64,
    /// Packets decoded in either direction
    pub packets_decoded: AtomicU64,
    /// Client-facing key exchanges completed
    pub client_handshakes: AtomicU64,
    /// Server-facing key exchanges completed
    pub server_handshakes: AtomicU64,
    /// Handshake steps aborted
    pub handshakes_failed: AtomicU64,
    /// Directions demoted to blind relay
    pub blind_fallbacks: AtomicU64,
    /// Sessions terminated by a protocol violation
    pub protocol_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            bytes_from_client: AtomicU64::new(0),
            bytes_from_server: AtomicU64::new(0),
            packets_decoded: AtomicU64::new(0),
            client_handshakes: AtomicU64::new(0),
            server_handshakes: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            blind_fallbacks: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new session
    pub fn session_opened(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session closed
    pub fn session_closed(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connect_failed(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes read from one side
    pub fn bytes_received(&self, from: Side, count: usize) {
        let counter = match from {
            Side::Client => &self.bytes_from_client,
            Side::Server => &self.bytes_from_server,
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn packet_decoded(&self) {
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed key exchange with one side
    pub fn handshake_completed(&self, side: Side) {
        let counter = match side {
            Side::Client => &self.client_handshakes,
            Side::Server => &self.server_handshakes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blind_fallback(&self) {
        self.blind_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            bytes_from_client: self.bytes_from_client.load(Ordering::Relaxed),
            bytes_from_server: self.bytes_from_server.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            client_handshakes: self.client_handshakes.load(Ordering::Relaxed),
            server_handshakes: self.server_handshakes.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            blind_fallbacks: self.blind_fallbacks.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_total = snapshot.sessions_total,
            sessions_active = snapshot.sessions_active,
            connect_failures = snapshot.connect_failures,
            bytes_from_client = snapshot.bytes_from_client,
            bytes_from_server = snapshot.bytes_from_server,
            packets_decoded = snapshot.packets_decoded,
            client_handshakes = snapshot.client_handshakes,
            server_handshakes = snapshot.server_handshakes,
            handshakes_failed = snapshot.handshakes_failed,
            blind_fallbacks = snapshot.blind_fallbacks,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Proxy metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub connect_failures: u64,
    pub bytes_from_client: u64,
    pub bytes_from_server: u64,
    pub packets_decoded: u64,
    pub client_handshakes: u64,
    pub server_handshakes: u64,
    pub handshakes_failed: u64,
    pub blind_fallbacks: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}
