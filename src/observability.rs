use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests handled. Labels: endpoint.
pub const REQUESTS_TOTAL: &str = "innkeep_requests_total";

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";

/// Counter: bookings whose stay was shifted by the availability search.
pub const BOOKINGS_RESCHEDULED_TOTAL: &str = "innkeep_bookings_rescheduled_total";

/// Counter: status transitions applied. Labels: status.
pub const STATUS_TRANSITIONS_TOTAL: &str = "innkeep_status_transitions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: notifications dropped by a saturated outbox.
pub const NOTIFICATIONS_DROPPED_TOTAL: &str = "innkeep_notifications_dropped_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
