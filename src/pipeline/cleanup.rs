//! Per-source cleanup: validity, re-classification of generic labels, dedup.
//! Produces the counts the quality tracker turns into an audit row.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::constants::METHOD_RECLASSIFIED;
use crate::domain::{merge_flags, DataQuality, MetricFlag, MetricType, Source, Unit};
use crate::error::Result;
use crate::pipeline::processing::classifier::Classifier;
use crate::pipeline::processing::dedup::Deduplicator;
use crate::pipeline::processing::validity::{Rejection, RejectionKind, ValidityFilter, Verdict};
use crate::pipeline::records::{write_metric_records, MetricRecord};
use crate::registry::SourceRegistry;
use crate::tracker::{QualityRecord, QualityTracker, RunCounts};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedRecord {
    pub record: MetricRecord,
    pub reason: Rejection,
}

#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub source: Source,
    pub kept: Vec<MetricRecord>,
    pub removed: Vec<RemovedRecord>,
    pub counts: RunCounts,
}

pub struct CleanupPipeline {
    classifier: Classifier,
    filter: ValidityFilter,
    dedup: Deduplicator,
}

impl CleanupPipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            classifier: Classifier::new(config.classifier.clone()),
            filter: ValidityFilter::new(config.validity.clone())?,
            dedup: Deduplicator::new(&config.dedup),
        })
    }

    /// Clean one source's records. Input order is preserved among kept records.
    pub fn run(&self, source: &Source, records: Vec<MetricRecord>) -> CleanupReport {
        let total = records.len();
        let mut removed = Vec::new();
        // (record, modified)
        let mut survivors: Vec<(MetricRecord, bool)> = Vec::with_capacity(total);

        for record in records {
            let mut record = match self.filter.check(record.view()) {
                Verdict::Reject(reason) => {
                    debug!(source_id = source.id, %reason, "record rejected");
                    removed.push(RemovedRecord { record, reason });
                    continue;
                }
                Verdict::Review(flags) => with_flags(record, &flags),
                Verdict::Accept => record,
            };

            let mut modified = false;
            if record.metric_type == MetricType::GeneralRate {
                if let Some(corrected) = self.reclassify(&record) {
                    // The new label can expose a category/unit conflict
                    match self.filter.check(corrected.view()) {
                        Verdict::Reject(reason) => {
                            removed.push(RemovedRecord {
                                record: corrected,
                                reason,
                            });
                            continue;
                        }
                        verdict => {
                            record = with_flags(corrected, verdict.flags());
                            modified = true;
                        }
                    }
                }
            }
            survivors.push((record, modified));
        }

        let rows: Vec<&MetricRecord> = survivors.iter().map(|(r, _)| r).collect();
        let outcome = self.dedup.run(&rows);
        for dup in &outcome.removed {
            removed.push(RemovedRecord {
                record: survivors[dup.index].0.clone(),
                reason: Rejection {
                    kind: RejectionKind::Duplicate,
                    detail: format!("same value, unit, year and context as row {}", dup.kept_index),
                },
            });
        }

        let mut kept = Vec::with_capacity(outcome.kept.len());
        let mut modified = 0;
        for &i in &outcome.kept {
            let (record, was_modified) = &survivors[i];
            if *was_modified {
                modified += 1;
            }
            kept.push(record.clone());
        }

        let counts = RunCounts {
            total,
            kept: kept.len(),
            removed: removed.len(),
            modified,
            duplicate_groups: outcome.duplicate_groups,
            duplicates_removed: outcome.removed.len(),
            largest_duplicate_group: outcome.largest_group,
            top_removal_reason: top_removal_reason(&removed),
        };

        info!(
            source_id = source.id,
            source_name = %source.name,
            total,
            kept = counts.kept,
            removed = counts.removed,
            modified,
            "cleanup complete"
        );

        CleanupReport {
            source: source.clone(),
            kept,
            removed,
            counts,
        }
    }

    /// Clean every source found in `records`, in order of first appearance
    pub fn run_batch(
        &self,
        registry: &SourceRegistry,
        records: Vec<MetricRecord>,
    ) -> Vec<CleanupReport> {
        group_by_source(records)
            .into_iter()
            .map(|(source_id, records)| {
                let source = registry.resolve(source_id);
                let span = tracing::info_span!("cleanup", source_id, source = %source.name);
                let _enter = span.enter();
                self.run(&source, records)
            })
            .collect()
    }

    /// A corrected copy with a concrete type, or None if no rule matches
    fn reclassify(&self, record: &MetricRecord) -> Option<MetricRecord> {
        let c = self.classifier.classify(
            record.value,
            unit_hint(record.unit),
            &record.context,
            record.metric_type,
        );
        if !c.matched_rule || c.metric_type == MetricType::GeneralRate {
            return None;
        }

        let mut corrected = record.clone();
        corrected.metric_type = c.metric_type;
        if corrected.unit == Unit::Unknown {
            corrected.unit = c.unit;
        }
        corrected.confidence = Some(c.confidence);
        corrected.data_quality = Some(DataQuality::from_confidence(c.confidence));
        corrected.sector = corrected.sector.or(c.sector);
        corrected.geographic_scope = corrected.geographic_scope.or(c.geographic_scope);
        corrected.company_size = corrected.company_size.or(c.company_size);
        corrected.extraction_method = METHOD_RECLASSIFIED.to_string();
        let mut flags = corrected.flags();
        merge_flags(&mut flags, &c.flags);
        corrected.set_flags(&flags);
        Some(corrected)
    }
}

/// Split records per source, keeping first-appearance order of sources and rows
pub fn group_by_source(records: Vec<MetricRecord>) -> Vec<(u32, Vec<MetricRecord>)> {
    let mut groups: Vec<(u32, Vec<MetricRecord>)> = Vec::new();
    let mut index: HashMap<u32, usize> = HashMap::new();
    for record in records {
        let id = record.source_id;
        let slot = *index.entry(id).or_insert_with(|| {
            groups.push((id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record);
    }
    groups
}

/// Write the cleaned rows of every report to `output`, then append one audit
/// row per report. Nothing is recorded if the output cannot be written.
pub fn write_and_record(
    reports: &[CleanupReport],
    output: &Path,
    tracker: &mut QualityTracker,
) -> Result<Vec<QualityRecord>> {
    let cleaned: Vec<MetricRecord> = reports
        .iter()
        .flat_map(|r| r.kept.iter().cloned())
        .collect();
    write_metric_records(output, &cleaned)?;

    reports
        .iter()
        .map(|r| tracker.record(r.source.id, &r.source.name, &r.counts))
        .collect()
}

fn with_flags(mut record: MetricRecord, extra: &[MetricFlag]) -> MetricRecord {
    if extra.is_empty() {
        return record;
    }
    let mut flags = record.flags();
    merge_flags(&mut flags, extra);
    record.set_flags(&flags);
    record
}

/// Map a stored unit back to the hint the classifier understands
fn unit_hint(unit: Unit) -> Option<&'static str> {
    match unit {
        Unit::Percentage => Some("%"),
        Unit::UsdMillions => Some("million"),
        Unit::UsdBillions => Some("billion"),
        Unit::Count => Some("companies"),
        Unit::Years => Some("years"),
        Unit::Ratio | Unit::Unknown => None,
    }
}

/// Most frequent rejection kind; ties go to the kind seen first
fn top_removal_reason(removed: &[RemovedRecord]) -> Option<String> {
    let mut tally: Vec<(RejectionKind, usize)> = Vec::new();
    for r in removed {
        match tally.iter_mut().find(|(k, _)| *k == r.reason.kind) {
            Some((_, n)) => *n += 1,
            None => tally.push((r.reason.kind, 1)),
        }
    }
    let mut best: Option<(RejectionKind, usize)> = None;
    for (kind, n) in tally {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((kind, n));
        }
    }
    best.map(|(kind, _)| kind.label().to_string())
}
