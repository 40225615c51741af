//! Quality Tracker
//!
//! One `QualityRecord` per (source, run) is appended to an append-only audit
//! store. History and trends are re-derived from the whole store on each call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::ports::AuditStore;
use crate::config::TrackerConfig;
use crate::constants::SUMMARY_FILE_STEM;
use crate::error::Result;
use crate::metrics::TrackerMetrics;

const TREND_LIST_LEN: usize = 5;

/// Counts gathered by one cleanup run over one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub kept: usize,
    pub removed: usize,
    pub modified: usize,
    pub duplicate_groups: usize,
    pub duplicates_removed: usize,
    pub largest_duplicate_group: usize,
    pub top_removal_reason: Option<String>,
}

/// One audit row. Field order is the file's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub source_id: u32,
    pub source_name: String,
    pub schema_version: String,
    pub total_records: usize,
    pub kept_records: usize,
    pub removed_records: usize,
    pub modified_records: usize,
    pub removal_rate: f64,
    pub modification_rate: f64,
    pub quality_score: f64,
    pub duplicate_groups: usize,
    pub duplicates_removed: usize,
    pub largest_duplicate_group: usize,
    pub top_removal_reason: Option<String>,
}

impl QualityRecord {
    /// Derive rates and score from raw counts. With no records the rates are
    /// 0 and the score is 100: no data means no detected problems.
    pub fn compute(
        source_id: u32,
        source_name: &str,
        counts: &RunCounts,
        schema_version: &str,
        run_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let (removal_rate, modification_rate) = if counts.total == 0 {
            (0.0, 0.0)
        } else {
            let total = counts.total as f64;
            (
                counts.removed as f64 / total * 100.0,
                counts.modified as f64 / total * 100.0,
            )
        };

        Self {
            timestamp,
            run_id,
            source_id,
            source_name: source_name.to_string(),
            schema_version: schema_version.to_string(),
            total_records: counts.total,
            kept_records: counts.kept,
            removed_records: counts.removed,
            modified_records: counts.modified,
            removal_rate: round2(removal_rate),
            modification_rate: round2(modification_rate),
            quality_score: round2(quality_score(removal_rate, modification_rate)),
            duplicate_groups: counts.duplicate_groups,
            duplicates_removed: counts.duplicates_removed,
            largest_duplicate_group: counts.largest_duplicate_group,
            top_removal_reason: counts.top_removal_reason.clone(),
        }
    }
}

/// `clamp(100 - (removal% + modification%/2), 0, 100)`
pub fn quality_score(removal_rate: f64, modification_rate: f64) -> f64 {
    (100.0 - (removal_rate + modification_rate / 2.0)).clamp(0.0, 100.0)
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceScore {
    pub source_id: u32,
    pub source_name: String,
    pub quality_score: f64,
    pub removal_rate: f64,
    pub top_removal_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Improvement {
    pub source_id: u32,
    pub source_name: String,
    pub first_score: f64,
    pub latest_score: f64,
    pub improvement: f64,
    pub runs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub sources_tracked: usize,
    pub total_runs: usize,
    pub average_quality_score: f64,
    pub average_removal_rate: f64,
    pub average_modification_rate: f64,
    pub total_records_processed: usize,
    pub total_records_removed: usize,
    pub total_records_modified: usize,
    /// Lowest latest scores first
    pub most_problematic: Vec<SourceScore>,
    /// Largest first-to-last score gain first
    pub most_improved: Vec<Improvement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Trends {
    /// The audit store is empty, missing or unreadable
    NoData,
    Report(TrendReport),
}

struct SourceRuns<'a> {
    first: &'a QualityRecord,
    latest: &'a QualityRecord,
    runs: usize,
}

/// Aggregate the latest record of each source. Ties on timestamp resolve by
/// insertion order; sources are listed in order of first appearance.
pub fn compute_trends(records: &[QualityRecord]) -> Trends {
    if records.is_empty() {
        return Trends::NoData;
    }

    let mut order: Vec<u32> = Vec::new();
    let mut by_source: HashMap<u32, SourceRuns<'_>> = HashMap::new();
    for record in records {
        match by_source.get_mut(&record.source_id) {
            Some(runs) => {
                runs.runs += 1;
                if record.timestamp < runs.first.timestamp {
                    runs.first = record;
                }
                if record.timestamp >= runs.latest.timestamp {
                    runs.latest = record;
                }
            }
            None => {
                order.push(record.source_id);
                by_source.insert(
                    record.source_id,
                    SourceRuns {
                        first: record,
                        latest: record,
                        runs: 1,
                    },
                );
            }
        }
    }

    let per_source: Vec<&SourceRuns<'_>> = order.iter().filter_map(|id| by_source.get(id)).collect();
    let n = per_source.len() as f64;
    let mean = |f: fn(&QualityRecord) -> f64| {
        round2(per_source.iter().map(|s| f(s.latest)).sum::<f64>() / n)
    };

    let mut most_problematic: Vec<SourceScore> = per_source
        .iter()
        .map(|s| SourceScore {
            source_id: s.latest.source_id,
            source_name: s.latest.source_name.clone(),
            quality_score: s.latest.quality_score,
            removal_rate: s.latest.removal_rate,
            top_removal_reason: s.latest.top_removal_reason.clone(),
        })
        .collect();
    most_problematic.sort_by(|a, b| a.quality_score.total_cmp(&b.quality_score));
    most_problematic.truncate(TREND_LIST_LEN);

    let mut most_improved: Vec<Improvement> = per_source
        .iter()
        .filter(|s| s.runs > 1)
        .map(|s| Improvement {
            source_id: s.latest.source_id,
            source_name: s.latest.source_name.clone(),
            first_score: s.first.quality_score,
            latest_score: s.latest.quality_score,
            improvement: round2(s.latest.quality_score - s.first.quality_score),
            runs: s.runs,
        })
        .collect();
    most_improved.sort_by(|a, b| b.improvement.total_cmp(&a.improvement));
    most_improved.truncate(TREND_LIST_LEN);

    Trends::Report(TrendReport {
        sources_tracked: per_source.len(),
        total_runs: records.len(),
        average_quality_score: mean(|r: &QualityRecord| r.quality_score),
        average_removal_rate: mean(|r: &QualityRecord| r.removal_rate),
        average_modification_rate: mean(|r: &QualityRecord| r.modification_rate),
        total_records_processed: per_source.iter().map(|s| s.latest.total_records).sum(),
        total_records_removed: per_source.iter().map(|s| s.latest.removed_records).sum(),
        total_records_modified: per_source.iter().map(|s| s.latest.modified_records).sum(),
        most_problematic,
        most_improved,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
    Both,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            "both" => Ok(ExportFormat::Both),
            other => Err(format!("unknown export format '{}' (json, text, both)", other)),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    sources: usize,
    total_records: usize,
    removed_records: usize,
    modified_records: usize,
    average_quality_score: Option<f64>,
    records: &'a [QualityRecord],
}

pub struct QualityTracker {
    store: Box<dyn AuditStore>,
    schema_version: String,
    reports_dir: PathBuf,
    run_id: Uuid,
    session: Vec<QualityRecord>,
}

impl QualityTracker {
    pub fn new(store: Box<dyn AuditStore>, config: &TrackerConfig) -> Self {
        Self {
            store,
            schema_version: config.schema_version.clone(),
            reports_dir: config.reports_dir.clone(),
            run_id: Uuid::new_v4(),
            session: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Records produced by this tracker instance
    pub fn session(&self) -> &[QualityRecord] {
        &self.session
    }

    pub fn record(
        &mut self,
        source_id: u32,
        source_name: &str,
        counts: &RunCounts,
    ) -> Result<QualityRecord> {
        self.record_at(source_id, source_name, counts, Utc::now())
    }

    pub fn record_at(
        &mut self,
        source_id: u32,
        source_name: &str,
        counts: &RunCounts,
        timestamp: DateTime<Utc>,
    ) -> Result<QualityRecord> {
        let record = QualityRecord::compute(
            source_id,
            source_name,
            counts,
            &self.schema_version,
            self.run_id,
            timestamp,
        );

        if let Err(e) = self.store.append(&record) {
            TrackerMetrics::record_append_error();
            return Err(e);
        }
        TrackerMetrics::record_append_success(record.quality_score);
        info!(
            source_id,
            source_name,
            quality_score = record.quality_score,
            removal_rate = record.removal_rate,
            modification_rate = record.modification_rate,
            "recorded quality run"
        );
        self.session.push(record.clone());
        Ok(record)
    }

    fn load_all(&self) -> Vec<QualityRecord> {
        match self.store.all() {
            Ok(records) => records,
            Err(e) => {
                TrackerMetrics::record_store_read_error();
                warn!(error = %e, "audit store unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    /// All records for a source in timestamp order, re-read from the store
    pub fn history(&self, source_id: u32) -> impl Iterator<Item = QualityRecord> {
        let mut records: Vec<QualityRecord> = self
            .load_all()
            .into_iter()
            .filter(|r| r.source_id == source_id)
            .collect();
        records.sort_by_key(|r| r.timestamp);
        records.into_iter()
    }

    pub fn trends(&self) -> Trends {
        compute_trends(&self.load_all())
    }

    /// Write this run's records to fresh timestamped files under the reports directory
    pub fn export_summary(&self, format: ExportFormat) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.reports_dir)?;
        let stem = format!(
            "{}_{}",
            SUMMARY_FILE_STEM,
            Utc::now().format("%Y%m%d_%H%M%S_%6f")
        );

        let mut written = Vec::new();
        if matches!(format, ExportFormat::Json | ExportFormat::Both) {
            let json = serde_json::to_string_pretty(&self.summary())?;
            written.push(write_new_file(&self.reports_dir, &stem, "json", json.as_bytes())?);
        }
        if matches!(format, ExportFormat::Text | ExportFormat::Both) {
            let text = self.text_report();
            written.push(write_new_file(&self.reports_dir, &stem, "txt", text.as_bytes())?);
        }
        for path in &written {
            info!(path = %path.display(), "exported quality summary");
        }
        Ok(written)
    }

    fn summary(&self) -> RunSummary<'_> {
        let average_quality_score = (!self.session.is_empty()).then(|| {
            round2(
                self.session.iter().map(|r| r.quality_score).sum::<f64>()
                    / self.session.len() as f64,
            )
        });
        RunSummary {
            run_id: self.run_id,
            generated_at: Utc::now(),
            sources: self.session.len(),
            total_records: self.session.iter().map(|r| r.total_records).sum(),
            removed_records: self.session.iter().map(|r| r.removed_records).sum(),
            modified_records: self.session.iter().map(|r| r.modified_records).sum(),
            average_quality_score,
            records: &self.session,
        }
    }

    fn text_report(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();
        let _ = writeln!(out, "QUALITY SUMMARY");
        let _ = writeln!(out, "run_id: {}", summary.run_id);
        let _ = writeln!(out, "generated_at: {}", summary.generated_at.to_rfc3339());
        let _ = writeln!(out, "sources: {}", summary.sources);
        let _ = writeln!(out, "total_records: {}", summary.total_records);
        let _ = writeln!(out, "removed_records: {}", summary.removed_records);
        let _ = writeln!(out, "modified_records: {}", summary.modified_records);
        if let Some(avg) = summary.average_quality_score {
            let _ = writeln!(out, "average_quality_score: {:.2}", avg);
        }
        for r in summary.records {
            let _ = writeln!(out);
            let _ = writeln!(out, "[{}] {}", r.source_id, r.source_name);
            let _ = writeln!(out, "  timestamp: {}", r.timestamp.to_rfc3339());
            let _ = writeln!(out, "  schema_version: {}", r.schema_version);
            let _ = writeln!(
                out,
                "  records: total={} kept={} removed={} modified={}",
                r.total_records, r.kept_records, r.removed_records, r.modified_records
            );
            let _ = writeln!(
                out,
                "  rates: removal={:.2}% modification={:.2}%",
                r.removal_rate, r.modification_rate
            );
            let _ = writeln!(out, "  quality_score: {:.2}", r.quality_score);
            let _ = writeln!(
                out,
                "  duplicates: groups={} removed={} largest_group={}",
                r.duplicate_groups, r.duplicates_removed, r.largest_duplicate_group
            );
            let _ = writeln!(
                out,
                "  top_removal_reason: {}",
                r.top_removal_reason.as_deref().unwrap_or("none")
            );
        }
        out
    }
}

/// Create `dir/stem.ext`, or `dir/stem_N.ext` if taken. Never overwrites.
fn write_new_file(dir: &Path, stem: &str, ext: &str, contents: &[u8]) -> Result<PathBuf> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, attempt, ext)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(contents)?;
                file.flush()?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}
