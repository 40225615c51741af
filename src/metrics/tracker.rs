//! Quality Tracker Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Quality Tracker phase
pub struct TrackerMetrics;

impl TrackerMetrics {
    pub fn record_append_success(quality_score: f64) {
        ::metrics::counter!(phase_metric!(counter, "tracker", "appends_success")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "tracker", "last_quality_score")).set(quality_score);
    }

    pub fn record_append_error() {
        ::metrics::counter!(phase_metric!(counter, "tracker", "appends_error")).increment(1);
    }

    pub fn record_store_read_error() {
        ::metrics::counter!(phase_metric!(counter, "tracker", "store_read_errors")).increment(1);
    }
}

impl PhaseMetrics for TrackerMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "tracker", "appends_success"));
        let _ = ::metrics::counter!(phase_metric!(counter, "tracker", "appends_error"));
        let _ = ::metrics::counter!(phase_metric!(counter, "tracker", "store_read_errors"));
        let _ = ::metrics::gauge!(phase_metric!(gauge, "tracker", "last_quality_score"));
    }

    fn phase_name() -> &'static str {
        "tracker"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "tracker", "appends_success"),
                metric_type: MetricType::Counter,
                help: "Quality records appended to the audit log",
            },
            MetricDoc {
                name: phase_metric!(counter, "tracker", "appends_error"),
                metric_type: MetricType::Counter,
                help: "Failed audit log appends",
            },
            MetricDoc {
                name: phase_metric!(counter, "tracker", "store_read_errors"),
                metric_type: MetricType::Counter,
                help: "Audit store reads that fell back to an empty result",
            },
            MetricDoc {
                name: phase_metric!(gauge, "tracker", "last_quality_score"),
                metric_type: MetricType::Gauge,
                help: "Quality score of the most recently recorded run",
            },
        ]
    }
}
