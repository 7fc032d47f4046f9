//! Prometheus metrics (ambient observability, grounded in the teacher
//! crate's `metrics`/`metrics-exporter-prometheus` usage).
//!
//! Not named by `spec.md`, which excludes a metrics surface as a
//! collaborator concern, but the ambient stack still carries real
//! instrumentation the way the teacher does it.

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::Result;

const OPERATIONS_INGESTED: &str = "gateway_operations_ingested_total";
const CONFIRMATIONS_ADVANCED: &str = "gateway_confirmations_advanced_total";
const BOOKER_PUSH_FAILURES: &str = "gateway_booker_push_failures_total";
const BROADCAST_FAILURES: &str = "gateway_broadcast_failures_total";

/// Install the global Prometheus recorder and start its HTTP listener at
/// `bind`.
pub fn install(bind: std::net::SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(bind)
        .install()
        .map_err(|err| crate::error::Error::Io(std::io::Error::other(err)))?;
    describe();
    Ok(())
}

fn describe() {
    metrics::describe_counter!(OPERATIONS_INGESTED, "Operations the Watcher has validated and persisted.");
    metrics::describe_counter!(CONFIRMATIONS_ADVANCED, "Times the Confirmer has advanced an operation's confirmation count.");
    metrics::describe_counter!(BOOKER_PUSH_FAILURES, "Booker RPC pushes that failed and were left for the next sweep.");
    metrics::describe_counter!(BROADCAST_FAILURES, "Chain broadcasts that failed and left their row in WAIT.");
}

/// Record one operation ingested by the Watcher.
pub fn operation_ingested() {
    metrics::counter!(OPERATIONS_INGESTED).increment(1);
}

/// Record one operation whose confirmation count advanced.
pub fn confirmation_advanced() {
    metrics::counter!(CONFIRMATIONS_ADVANCED).increment(1);
}

/// Record a failed push to the booker.
pub fn booker_push_failed() {
    metrics::counter!(BOOKER_PUSH_FAILURES).increment(1);
}

/// Record a failed broadcast attempt.
pub fn broadcast_failed() {
    metrics::counter!(BROADCAST_FAILURES).increment(1);
}
