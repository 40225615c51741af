//! Validity Filter Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Validity Filter phase
pub struct ValidityMetrics;

impl ValidityMetrics {
    pub fn record_accept() {
        ::metrics::counter!(phase_metric!(counter, "validity", "accepted")).increment(1);
    }

    pub fn record_review() {
        ::metrics::counter!(phase_metric!(counter, "validity", "flagged")).increment(1);
    }

    pub fn record_reject() {
        ::metrics::counter!(phase_metric!(counter, "validity", "rejected")).increment(1);
    }
}

impl PhaseMetrics for ValidityMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "validity", "accepted"));
        let _ = ::metrics::counter!(phase_metric!(counter, "validity", "flagged"));
        let _ = ::metrics::counter!(phase_metric!(counter, "validity", "rejected"));
    }

    fn phase_name() -> &'static str {
        "validity"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "validity", "accepted"),
                metric_type: MetricType::Counter,
                help: "Records that passed every validity rule",
            },
            MetricDoc {
                name: phase_metric!(counter, "validity", "flagged"),
                metric_type: MetricType::Counter,
                help: "Records kept but flagged for manual review",
            },
            MetricDoc {
                name: phase_metric!(counter, "validity", "rejected"),
                metric_type: MetricType::Counter,
                help: "Records rejected by a validity rule",
            },
        ]
    }
}
