use std::net::SocketAddr;

// ── Booking metrics ─────────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "slotbook_bookings_created_total";

/// Counter: claims rejected because the slot was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "slotbook_booking_conflicts_total";

/// Counter: lifecycle transitions. Labels: transition, outcome.
pub const BOOKING_TRANSITIONS_TOTAL: &str = "slotbook_booking_transitions_total";

/// Counter: slots created by generation.
pub const SLOTS_GENERATED_TOTAL: &str = "slotbook_slots_generated_total";

/// Histogram: engine operation latency in seconds. Labels: operation, outcome.
pub const OPERATION_DURATION_SECONDS: &str = "slotbook_operation_duration_seconds";

// ── Storage metrics ─────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Gauge: tenants with a loaded engine.
pub const TENANTS_ACTIVE: &str = "slotbook_tenants_active";

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

/// Record duration and outcome of one engine call.
pub(crate) fn record_operation<T, E>(operation: &'static str, started: std::time::Instant, result: &Result<T, E>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => operation, "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}
