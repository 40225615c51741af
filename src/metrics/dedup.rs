//! Deduplicator Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Deduplicator phase
pub struct DedupMetrics;

impl DedupMetrics {
    pub fn record_run(input: usize, duplicate_groups: usize, removed: usize) {
        ::metrics::counter!(phase_metric!(counter, "dedup", "records_seen")).increment(input as u64);
        ::metrics::counter!(phase_metric!(counter, "dedup", "duplicate_groups"))
            .increment(duplicate_groups as u64);
        ::metrics::counter!(phase_metric!(counter, "dedup", "removed")).increment(removed as u64);
    }
}

impl PhaseMetrics for DedupMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "dedup", "records_seen"));
        let _ = ::metrics::counter!(phase_metric!(counter, "dedup", "duplicate_groups"));
        let _ = ::metrics::counter!(phase_metric!(counter, "dedup", "removed"));
    }

    fn phase_name() -> &'static str {
        "dedup"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "dedup", "records_seen"),
                metric_type: MetricType::Counter,
                help: "Records passed to the deduplicator",
            },
            MetricDoc {
                name: phase_metric!(counter, "dedup", "duplicate_groups"),
                metric_type: MetricType::Counter,
                help: "Groups of records sharing value, unit and year",
            },
            MetricDoc {
                name: phase_metric!(counter, "dedup", "removed"),
                metric_type: MetricType::Counter,
                help: "Records removed as duplicates",
            },
        ]
    }
}
