use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Business Metrics
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_sessions_total",
        "Total number of exam sessions",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "exam_sessions_active",
        "Number of currently active exam sessions"
    )
    .unwrap();

    pub static ref ANSWERS_RECORDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_answers_recorded_total",
        "Total number of answer selections processed",
        &["outcome"]
    )
    .unwrap();

    pub static ref RECONCILE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_reconcile_total",
        "Total number of authoritative clock reconciliations",
        &["status"]
    )
    .unwrap();

    pub static ref AUTO_ADVANCE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_auto_advance_total",
        "Total number of navigation events",
        &["trigger"]
    )
    .unwrap();

    pub static ref INDEX_PERSIST_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_index_persist_failures_total",
        "Failed best-effort question-index persistence calls",
        &["reason"]
    )
    .unwrap();

    pub static ref RANK_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exam_rank_lookups_total",
        "Total number of rank estimation calls",
        &["status"]
    )
    .unwrap();
}

/// Render all registered metrics in the Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_contains_registered_metric() {
        SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        let output = render();
        assert!(output.contains("exam_sessions_total"));
    }
}
