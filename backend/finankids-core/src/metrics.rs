use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Lesson Metrics
    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of answers submitted",
        &["activity", "correct"]
    )
    .unwrap();

    pub static ref LESSONS_FINISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "lessons_finished_total",
        "Total number of lesson sessions that ended",
        &["outcome"]
    )
    .unwrap();

    // Achievement Metrics
    pub static ref ACHIEVEMENT_TRIGGERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "achievement_triggers_total",
        "Total number of achievement triggers processed",
        &["trigger", "status"]
    )
    .unwrap();

    pub static ref ACHIEVEMENT_TRIGGERS_QUEUED: IntGauge = register_int_gauge!(
        "achievement_triggers_queued",
        "Number of triggers waiting on the achievement bus"
    )
    .unwrap();

    pub static ref ACHIEVEMENTS_UNLOCKED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "achievements_unlocked_total",
        "Total number of achievements unlocked",
        &["achievement"]
    )
    .unwrap();

    pub static ref ACHIEVEMENT_REWARDS_CLAIMED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "achievement_rewards_claimed_total",
        "Total number of achievement rewards claimed",
        &["achievement"]
    )
    .unwrap();

    // Store Metrics
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of document store operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Document store operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track document store operation with metrics
pub async fn track_store_operation<F, T, E>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&["multiple_choice", "true"])
            .get();
    }

    #[test]
    fn test_render_metrics() {
        ACHIEVEMENTS_UNLOCKED_TOTAL
            .with_label_values(&["first_lesson"])
            .inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("achievements_unlocked_total"));
    }

    #[tokio::test]
    async fn track_store_operation_counts_failures() {
        let before = STORE_OPERATIONS_TOTAL
            .with_label_values(&["find", "metrics_test", "error"])
            .get();

        let result: Result<(), &str> =
            track_store_operation("find", "metrics_test", async { Err("boom") }).await;

        assert!(result.is_err());
        let after = STORE_OPERATIONS_TOTAL
            .with_label_values(&["find", "metrics_test", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
