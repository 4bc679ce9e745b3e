//! Prometheus metrics for the swap orchestrator.
//!
//! Registered the way `operator::metrics` does (`lazy_static!` +
//! `register_counter_vec!`/`register_gauge_vec!`), but exposed over the
//! canceler's axum `/metrics` route rather than the operator's raw-socket
//! server — see `SPEC_FULL.md` §4.5.

#![allow(dead_code)]

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref SESSIONS_CREATED: CounterVec = register_counter_vec!(
        "orchestrator_sessions_created_total",
        "Total number of swap sessions created",
        &["source_chain", "destination_chain"]
    )
    .unwrap();

    pub static ref SESSIONS_COMPLETED: CounterVec = register_counter_vec!(
        "orchestrator_sessions_completed_total",
        "Total number of sessions that reached completed",
        &["source_chain", "destination_chain"]
    )
    .unwrap();

    pub static ref SESSIONS_REFUNDED: CounterVec = register_counter_vec!(
        "orchestrator_sessions_refunded_total",
        "Total number of sessions that reached refunded",
        &["source_chain", "destination_chain"]
    )
    .unwrap();

    pub static ref SESSIONS_FAILED: CounterVec = register_counter_vec!(
        "orchestrator_sessions_failed_total",
        "Total number of sessions that reached failed",
        &["source_chain", "destination_chain"]
    )
    .unwrap();

    pub static ref SESSIONS_CANCELLED: CounterVec = register_counter_vec!(
        "orchestrator_sessions_cancelled_total",
        "Total number of sessions that reached cancelled",
        &["source_chain", "destination_chain"]
    )
    .unwrap();

    pub static ref ACTIVE_SESSIONS: Gauge = register_gauge!(
        "orchestrator_active_sessions",
        "Current number of non-terminal sessions"
    )
    .unwrap();

    pub static ref SECRET_REVEALS: CounterVec = register_counter_vec!(
        "orchestrator_secret_reveals_total",
        "Total number of successful secret reveals",
        &["chain"]
    )
    .unwrap();

    pub static ref NOTIFIER_SUBSCRIBERS: Gauge = register_gauge!(
        "orchestrator_notifier_subscribers",
        "Current number of connected push-channel subscribers"
    )
    .unwrap();

    pub static ref CHAIN_WRITE_RETRIES: CounterVec = register_counter_vec!(
        "orchestrator_chain_write_retries_total",
        "Total number of chain write retries",
        &["chain", "phase"]
    )
    .unwrap();

    pub static ref CIRCUIT_BREAKER_TRIPS: CounterVec = register_counter_vec!(
        "orchestrator_circuit_breaker_trips_total",
        "Total number of times a chain's write circuit breaker opened",
        &["chain"]
    )
    .unwrap();

    pub static ref EVENT_MONITOR_REORGS: CounterVec = register_counter_vec!(
        "orchestrator_event_monitor_reorgs_total",
        "Total number of reorgs detected by the event monitor",
        &["chain"]
    )
    .unwrap();

    pub static ref QUOTES_SERVED: CounterVec = register_counter_vec!(
        "orchestrator_quotes_served_total",
        "Total number of quotes returned",
        &["urgency"]
    )
    .unwrap();

    pub static ref COORDINATOR_PHASE_LATENCY: HistogramVec = register_histogram_vec!(
        "orchestrator_coordinator_phase_latency_seconds",
        "Time spent in each coordinator phase",
        &["phase"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    pub static ref UP: Gauge = register_gauge!(
        "orchestrator_up",
        "Whether the orchestrator process is up and running"
    )
    .unwrap();

    pub static ref LAST_SUCCESSFUL_POLL: GaugeVec = register_gauge_vec!(
        "orchestrator_last_successful_poll_timestamp",
        "Unix timestamp of the last successful event monitor poll",
        &["chain"]
    )
    .unwrap();
}

/// Gather and text-encode every registered metric. Used by the `/metrics`
/// axum handler in `api.rs`.
pub fn encode() -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

pub fn record_session_created(source_chain: &str, destination_chain: &str) {
    SESSIONS_CREATED
        .with_label_values(&[source_chain, destination_chain])
        .inc();
}

pub fn record_session_terminal(source_chain: &str, destination_chain: &str, status: &str) {
    match status {
        "completed" => SESSIONS_COMPLETED.with_label_values(&[source_chain, destination_chain]).inc(),
        "refunded" => SESSIONS_REFUNDED.with_label_values(&[source_chain, destination_chain]).inc(),
        "cancelled" => SESSIONS_CANCELLED.with_label_values(&[source_chain, destination_chain]).inc(),
        "failed" => SESSIONS_FAILED.with_label_values(&[source_chain, destination_chain]).inc(),
        _ => {}
    }
}
