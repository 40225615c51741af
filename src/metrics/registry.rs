//! Metrics registry for coordinating phase-specific metrics
//!
//! Registers every phase's metrics and detects naming conflicts early.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases
pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::ScannerMetrics>(&mut all_metrics);
    register_phase_metrics::<super::ClassifierMetrics>(&mut all_metrics);
    register_phase_metrics::<super::ValidityMetrics>(&mut all_metrics);
    register_phase_metrics::<super::DedupMetrics>(&mut all_metrics);
    register_phase_metrics::<super::TrackerMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );
}

/// Register metrics for a specific phase and detect conflicts
fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' redefined by phase '{}'",
                doc.name, phase_name
            );
        } else {
            debug!("  - {} ({:?}): {}", doc.name, doc.metric_type, doc.help);
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Names of every documented metric, sorted
pub fn documented_metric_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = [
        super::ScannerMetrics::metrics_documentation(),
        super::ClassifierMetrics::metrics_documentation(),
        super::ValidityMetrics::metrics_documentation(),
        super::DedupMetrics::metrics_documentation(),
        super::TrackerMetrics::metrics_documentation(),
    ]
    .into_iter()
    .flatten()
    .map(|doc| doc.name)
    .collect();
    names.sort_unstable();
    names
}
