//! Scanner Phase Metrics
//!
//! Spans gated by keywords, candidates produced and tokens that failed to parse.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Scanner phase
pub struct ScannerMetrics;

impl ScannerMetrics {
    /// Record one span that passed the keyword gate
    pub fn record_span_scanned(candidates: usize) {
        ::metrics::counter!(phase_metric!(counter, "scanner", "spans_scanned")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "scanner", "candidates"))
            .increment(candidates as u64);
    }

    /// Record a numeric token that could not be parsed
    pub fn record_parse_failure() {
        ::metrics::counter!(phase_metric!(counter, "scanner", "parse_failures")).increment(1);
    }
}

impl PhaseMetrics for ScannerMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "scanner", "spans_scanned"));
        let _ = ::metrics::counter!(phase_metric!(counter, "scanner", "candidates"));
        let _ = ::metrics::counter!(phase_metric!(counter, "scanner", "parse_failures"));
    }

    fn phase_name() -> &'static str {
        "scanner"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "scanner", "spans_scanned"),
                metric_type: MetricType::Counter,
                help: "Text spans that contained at least one target keyword",
            },
            MetricDoc {
                name: phase_metric!(counter, "scanner", "candidates"),
                metric_type: MetricType::Counter,
                help: "Numeric candidates produced by the scanner",
            },
            MetricDoc {
                name: phase_metric!(counter, "scanner", "parse_failures"),
                metric_type: MetricType::Counter,
                help: "Numeric tokens skipped because they did not parse",
            },
        ]
    }
}
