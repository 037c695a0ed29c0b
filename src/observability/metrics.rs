//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define perimeter metrics (rejections, quarantines, audit throughput)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `perimeter_csrf_rejections_total` (counter): by failed check
//! - `perimeter_admin_denials_total` (counter)
//! - `perimeter_webhook_rejections_total` (counter): by reason
//! - `perimeter_webhooks_accepted_total` (counter)
//! - `perimeter_files_quarantined_total` (counter): by reason code
//! - `perimeter_quarantine_reviews_total` (counter): by outcome
//! - `perimeter_audit_events_total` (counter): by action
//! - `perimeter_audit_dropped_total` (counter)
//! - `perimeter_decrypt_passthrough_total` (counter): by cause
//!
//! # Design Decisions
//! - Updates are no-ops until a recorder is installed (tests stay silent)
//! - Labels carry reasons and codes only, never identities or values

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_csrf_rejection(reason: &'static str) {
    ::metrics::counter!("perimeter_csrf_rejections_total", "reason" => reason).increment(1);
}

pub fn record_admin_denial() {
    ::metrics::counter!("perimeter_admin_denials_total").increment(1);
}

pub fn record_webhook_rejection(reason: &'static str) {
    ::metrics::counter!("perimeter_webhook_rejections_total", "reason" => reason).increment(1);
}

pub fn record_webhook_accepted() {
    ::metrics::counter!("perimeter_webhooks_accepted_total").increment(1);
}

pub fn record_file_quarantined(reason_code: &'static str) {
    ::metrics::counter!("perimeter_files_quarantined_total", "reason_code" => reason_code)
        .increment(1);
}

pub fn record_quarantine_review(outcome: &'static str) {
    ::metrics::counter!("perimeter_quarantine_reviews_total", "outcome" => outcome).increment(1);
}

pub fn record_audit_event(action: &'static str) {
    ::metrics::counter!("perimeter_audit_events_total", "action" => action).increment(1);
}

pub fn record_audit_dropped() {
    ::metrics::counter!("perimeter_audit_dropped_total").increment(1);
}

pub fn record_decrypt_passthrough(cause: &'static str) {
    ::metrics::counter!("perimeter_decrypt_passthrough_total", "cause" => cause).increment(1);
}
