//! Centralized metrics infrastructure for the extraction and cleanup pipeline
//!
//! Each pipeline phase defines its own metrics in a dedicated submodule, ensuring
//! clear ownership and preventing naming conflicts. No exporter is installed here;
//! an embedding application may install any `metrics` recorder before running.

pub mod classifier;
pub mod dedup;
pub mod registry;
pub mod scanner;
pub mod tracker;
pub mod validity;

pub use classifier::ClassifierMetrics;
pub use dedup::DedupMetrics;
pub use scanner::ScannerMetrics;
pub use tracker::TrackerMetrics;
pub use validity::ValidityMetrics;

use std::sync::Once;

static INIT: Once = Once::new();

/// Register all phase metrics. Idempotent.
pub fn init_metrics() {
    INIT.call_once(registry::register_all_metrics);
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Builds metric names of the form em_{phase}_{metric_name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("em_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("em_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("em_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "scanner", "candidates"),
            "em_scanner_candidates_total"
        );
        assert_eq!(
            phase_metric!(histogram, "tracker", "quality_score"),
            "em_tracker_quality_score"
        );
    }

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
    }
}
