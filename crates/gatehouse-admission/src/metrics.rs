// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; with no recorder installed every call is a no-op.

use metrics::describe_counter;

/// Register all Gatehouse metric descriptions.
pub fn register_metrics() {
    describe_counter!("gatehouse_sessions_created_total", "Challenge sessions created");
    describe_counter!(
        "gatehouse_resolutions_total",
        "Resolution attempts by verb and outcome"
    );
    describe_counter!(
        "gatehouse_queue_deliveries_total",
        "Delayed queue deliveries by kind and outcome"
    );
    describe_counter!(
        "gatehouse_notifications_total",
        "Answer notifications by mode and outcome"
    );
    describe_counter!(
        "gatehouse_external_failures_total",
        "Bot API calls that failed after a committed local change"
    );
}

pub fn record_session_created() {
    metrics::counter!("gatehouse_sessions_created_total").increment(1);
}

/// `verb` is accept, reject, ban or expire; `outcome` is claimed, not_found or denied.
pub fn record_resolution(verb: &str, outcome: &'static str) {
    metrics::counter!("gatehouse_resolutions_total", "verb" => verb.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_delivery(kind: &'static str, outcome: &'static str) {
    metrics::counter!("gatehouse_queue_deliveries_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}

pub fn record_notification(mode: &str, delivered: bool) {
    let outcome = if delivered { "sent" } else { "failed" };
    metrics::counter!("gatehouse_notifications_total", "mode" => mode.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_external_failure(operation: &'static str) {
    metrics::counter!("gatehouse_external_failures_total", "operation" => operation).increment(1);
}
