//! Prometheus metrics for workshop-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter, TextEncoder,
};
use service_core::error::AppError;

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "workshop_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Inventory movements appended to the ledger, by movement type.
pub static MOVEMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_inventory_movements_total",
        "Total number of inventory movements appended",
        &["movement_type"]
    )
    .expect("Failed to register inventory_movements_total")
});

/// Full work-order recomputes performed.
pub static RECONCILIATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "workshop_reconciliations_total",
        "Total number of work order recomputes"
    )
    .expect("Failed to register reconciliations_total")
});

/// Payments recorded against work orders, by method.
pub static PAYMENTS_RECORDED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_payments_recorded_total",
        "Total number of payments recorded",
        &["method"]
    )
    .expect("Failed to register payments_recorded_total")
});

/// Stock consumptions rejected for insufficient stock.
pub static INSUFFICIENT_STOCK_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "workshop_insufficient_stock_total",
        "Total number of stock consumptions rejected"
    )
    .expect("Failed to register insufficient_stock_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&MOVEMENTS_TOTAL);
    Lazy::force(&RECONCILIATIONS_TOTAL);
    Lazy::force(&PAYMENTS_RECORDED_TOTAL);
    Lazy::force(&INSUFFICIENT_STOCK_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode metrics: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_metrics_render_as_text() {
        init_metrics();
        RECONCILIATIONS_TOTAL.inc();
        MOVEMENTS_TOTAL.with_label_values(&["IN"]).inc();
        PAYMENTS_RECORDED_TOTAL.with_label_values(&["CASH"]).inc();
        DB_QUERY_DURATION
            .with_label_values(&["select"])
            .observe(0.001);

        let rendered = get_metrics().expect("encode metrics");
        assert!(rendered.contains("workshop_reconciliations_total"));
        assert!(rendered.contains("workshop_inventory_movements_total"));
        assert!(rendered.contains("workshop_payments_recorded_total"));
        assert!(rendered.contains("workshop_insufficient_stock_total"));
        assert!(rendered.contains("workshop_db_query_duration_seconds"));
    }
}
