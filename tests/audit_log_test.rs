use anyhow::Result;
use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::tempdir;

use econ_metrics::app::AuditStore;
use econ_metrics::config::TrackerConfig;
use econ_metrics::constants::QUALITY_RECORD_COLUMNS;
use econ_metrics::infra::CsvAuditStore;
use econ_metrics::tracker::{QualityTracker, RunCounts, Trends};
use econ_metrics::MetricsError;

fn counts(total: usize, removed: usize, modified: usize, reason: Option<&str>) -> RunCounts {
    RunCounts {
        total,
        kept: total - removed,
        removed,
        modified,
        top_removal_reason: reason.map(str::to_string),
        ..RunCounts::default()
    }
}

fn tracker_at(log: &std::path::Path, reports: &std::path::Path) -> QualityTracker {
    let config = TrackerConfig {
        audit_log_path: log.to_path_buf(),
        reports_dir: reports.to_path_buf(),
        ..TrackerConfig::default()
    };
    QualityTracker::new(Box::new(CsvAuditStore::new(log)), &config)
}

#[test]
fn test_audit_log_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let log = dir.path().join("output").join("quality_audit_log.csv");
    let mut tracker = tracker_at(&log, &dir.path().join("reports"));

    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let first = tracker.record_at(1, "Stanford AI Index", &counts(100, 30, 20, Some("duplicate")), t0)?;
    let second = tracker.record_at(2, "OECD Outlook", &counts(0, 0, 0, None), t0)?;
    assert_eq!(first.quality_score, 60.0);
    assert_eq!(second.quality_score, 100.0);

    let text = fs::read_to_string(&log)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], QUALITY_RECORD_COLUMNS.join(","));

    let stored = CsvAuditStore::new(&log).all()?;
    assert_eq!(stored, vec![first, second]);
    Ok(())
}

#[test]
fn test_header_is_written_once_across_runs() -> Result<()> {
    let dir = tempdir()?;
    let log = dir.path().join("audit.csv");

    for run in 0..3 {
        let mut tracker = tracker_at(&log, dir.path());
        tracker.record(7, "source_7", &counts(10, run, 0, None))?;
    }

    let text = fs::read_to_string(&log)?;
    let headers = text.lines().filter(|l| l.starts_with("timestamp,")).count();
    assert_eq!(headers, 1);
    assert_eq!(CsvAuditStore::new(&log).all()?.len(), 3);
    Ok(())
}

#[test]
fn test_append_after_hand_edited_log_without_final_newline() -> Result<()> {
    let dir = tempdir()?;
    let log = dir.path().join("audit.csv");
    tracker_at(&log, dir.path()).record(2, "OECD", &counts(10, 1, 0, None))?;

    // Editors often save without a trailing line break
    let text = fs::read_to_string(&log)?;
    fs::write(&log, text.trim_end_matches(['\r', '\n']))?;

    tracker_at(&log, dir.path()).record(2, "OECD", &counts(10, 2, 0, None))?;

    let rows = CsvAuditStore::new(&log).all()?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].removed_records, 1);
    assert_eq!(rows[1].removed_records, 2);
    assert!(fs::read_to_string(&log)?.ends_with('\n'));
    Ok(())
}

#[test]
fn test_foreign_header_is_a_schema_mismatch() -> Result<()> {
    let dir = tempdir()?;
    let log = dir.path().join("audit.csv");
    fs::write(&log, "when,who,score\n2024-01-01,1,90\n")?;

    let mut tracker = tracker_at(&log, dir.path());
    let err = tracker.record(1, "a", &counts(10, 1, 0, None)).unwrap_err();
    assert!(matches!(err, MetricsError::SchemaMismatch(_)));

    // Nothing was appended
    assert_eq!(fs::read_to_string(&log)?, "when,who,score\n2024-01-01,1,90\n");
    Ok(())
}

#[test]
fn test_trends_from_log_file() -> Result<()> {
    let dir = tempdir()?;
    let log = dir.path().join("audit.csv");

    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    {
        let mut tracker = tracker_at(&log, dir.path());
        tracker.record_at(4, "McKinsey State of AI", &counts(100, 40, 0, None), t0)?;
    }
    {
        let mut tracker = tracker_at(&log, dir.path());
        tracker.record_at(4, "McKinsey State of AI", &counts(100, 20, 0, None), t1)?;
    }

    let tracker = tracker_at(&log, dir.path());
    let history: Vec<f64> = tracker.history(4).map(|r| r.quality_score).collect();
    assert_eq!(history, vec![60.0, 80.0]);

    match tracker.trends() {
        Trends::Report(report) => {
            assert_eq!(report.most_improved.len(), 1);
            assert_eq!(report.most_improved[0].improvement, 20.0);
            assert_eq!(report.most_problematic[0].quality_score, 80.0);
        }
        Trends::NoData => panic!("expected trend data"),
    }
    Ok(())
}

#[test]
fn test_missing_log_means_no_data() -> Result<()> {
    let dir = tempdir()?;
    let tracker = tracker_at(&dir.path().join("never_written.csv"), dir.path());
    assert_eq!(tracker.trends(), Trends::NoData);
    assert_eq!(tracker.history(1).count(), 0);
    Ok(())
}
