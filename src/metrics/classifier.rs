//! Classifier Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Classifier phase
pub struct ClassifierMetrics;

impl ClassifierMetrics {
    pub fn record_classification(matched_rule: bool, inferred_unit: bool, confidence: f64) {
        ::metrics::counter!(phase_metric!(counter, "classifier", "classified")).increment(1);
        if !matched_rule {
            ::metrics::counter!(phase_metric!(counter, "classifier", "manual_review")).increment(1);
        }
        if inferred_unit {
            ::metrics::counter!(phase_metric!(counter, "classifier", "inferred_units")).increment(1);
        }
        ::metrics::histogram!(phase_metric!(histogram, "classifier", "confidence")).record(confidence);
    }
}

impl PhaseMetrics for ClassifierMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "classifier", "classified"));
        let _ = ::metrics::counter!(phase_metric!(counter, "classifier", "manual_review"));
        let _ = ::metrics::counter!(phase_metric!(counter, "classifier", "inferred_units"));
        let _ = ::metrics::histogram!(phase_metric!(histogram, "classifier", "confidence"));
    }

    fn phase_name() -> &'static str {
        "classifier"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "classifier", "classified"),
                metric_type: MetricType::Counter,
                help: "Candidates run through the classifier",
            },
            MetricDoc {
                name: phase_metric!(counter, "classifier", "manual_review"),
                metric_type: MetricType::Counter,
                help: "Candidates no rule matched, flagged for manual review",
            },
            MetricDoc {
                name: phase_metric!(counter, "classifier", "inferred_units"),
                metric_type: MetricType::Counter,
                help: "Units chosen by the magnitude heuristic",
            },
            MetricDoc {
                name: phase_metric!(histogram, "classifier", "confidence"),
                metric_type: MetricType::Histogram,
                help: "Confidence scores assigned by the classifier",
            },
        ]
    }
}
