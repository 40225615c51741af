use anyhow::Result;
use std::fs;
use tempfile::tempdir;

use econ_metrics::app::AuditStore;
use econ_metrics::config::{PipelineConfig, TrackerConfig};
use econ_metrics::domain::{MetricType, Source};
use econ_metrics::infra::{CsvAuditStore, InMemoryAuditStore};
use econ_metrics::pipeline::{
    read_metric_records, write_and_record, write_metric_records, CleanupPipeline,
};
use econ_metrics::registry::SourceRegistry;
use econ_metrics::tracker::{ExportFormat, QualityTracker};

const INPUT: &str = "\
value,unit,year,metric_type,context,source_id,confidence
35,percentage,2024,adoption_rate,35% of firms adopt AI in at least one function,1,0.8
35,percentage,2024,adoption_rate,35% of firms adopt AI in at least one function,1,0.8
150,percentage,2024,adoption_rate,150% growth in AI adoption since launch,1,0.7
19,count,2021.0,general_rate,during COVID-19 remote work expanded,1,
22,%,2023,general_rate,22% of workers report productivity gains from AI tools,2,0.6
12,percentage,2009,adoption_metric,12% adoption in 2009 baseline,2,0.5
";

#[test]
fn test_cleanup_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("metrics.csv");
    fs::write(&input, INPUT)?;

    let registry_path = dir.path().join("sources.csv");
    fs::write(&registry_path, "id,name,file_path\n1,AI Index 2024,ai_index.pdf\n")?;
    let registry = SourceRegistry::load(&registry_path)?;

    let loaded = read_metric_records(&input)?;
    assert_eq!(loaded.records.len(), 6);
    assert!(loaded.skipped.is_empty());

    let config = PipelineConfig::default();
    let pipeline = CleanupPipeline::new(&config)?;
    let log = dir.path().join("audit.csv");
    let tracker_config = TrackerConfig {
        audit_log_path: log.clone(),
        reports_dir: dir.path().join("reports"),
        ..TrackerConfig::default()
    };
    let mut tracker = QualityTracker::new(Box::new(CsvAuditStore::new(&log)), &tracker_config);

    let mut cleaned = Vec::new();
    for source_id in [1u32, 2] {
        let records: Vec<_> = loaded
            .records
            .iter()
            .filter(|r| r.source_id == source_id)
            .cloned()
            .collect();
        let source = registry.resolve(source_id);
        let report = pipeline.run(&source, records);
        tracker.record(source.id, &source.name, &report.counts)?;
        cleaned.extend(report.kept);
    }

    let session = tracker.session();
    assert_eq!(session.len(), 2);

    // Source 1: duplicate, out-of-range percentage and compound-term artifact removed
    assert_eq!(session[0].source_name, "AI Index 2024");
    assert_eq!(session[0].total_records, 4);
    assert_eq!(session[0].kept_records, 1);
    assert_eq!(session[0].removed_records, 3);
    assert_eq!(session[0].duplicates_removed, 1);
    assert_eq!(session[0].quality_score, 25.0);

    // Source 2: one re-classified, one outside the year range
    assert_eq!(session[1].source_name, "source_2");
    assert_eq!(session[1].total_records, 2);
    assert_eq!(session[1].removed_records, 1);
    assert_eq!(session[1].modified_records, 1);
    assert_eq!(session[1].quality_score, 25.0);

    assert_eq!(cleaned.len(), 2);
    assert_eq!(cleaned[1].metric_type, MetricType::ProductivityGain);

    let out = dir.path().join("cleaned.csv");
    write_metric_records(&out, &cleaned)?;
    let reread = read_metric_records(&out)?;
    assert_eq!(reread.records, cleaned);

    let exported = tracker.export_summary(ExportFormat::Both)?;
    assert_eq!(exported.len(), 2);
    assert!(exported.iter().all(|p| p.exists()));
    Ok(())
}

#[test]
fn test_legacy_labels_are_normalized_on_input() -> Result<()> {
    let text = "value,unit,year,metric_type,context,source_id\n\
                40,percent,2024,adoption_metric,40% adopted,3\n\
                2.5,usd_billion,2023,investment,$2.5 billion invested,3\n";
    let loaded = econ_metrics::pipeline::records::parse_metric_records(text)?;
    assert_eq!(loaded.records[0].metric_type, MetricType::AdoptionRate);
    assert_eq!(loaded.records.len(), 2);
    Ok(())
}

#[test]
fn test_empty_source_scores_100() -> Result<()> {
    let pipeline = CleanupPipeline::new(&PipelineConfig::default())?;
    let report = pipeline.run(&Source::unregistered(9), Vec::new());
    assert_eq!(report.counts.total, 0);

    let mut tracker = QualityTracker::new(
        Box::new(InMemoryAuditStore::new()),
        &TrackerConfig::default(),
    );
    let record = tracker.record(9, "source_9", &report.counts)?;
    assert_eq!(record.quality_score, 100.0);
    assert_eq!(record.removal_rate, 0.0);
    Ok(())
}

#[test]
fn test_batch_is_recorded_after_the_output_is_written() -> Result<()> {
    let dir = tempdir()?;
    let loaded = econ_metrics::pipeline::records::parse_metric_records(INPUT)?;
    let pipeline = CleanupPipeline::new(&PipelineConfig::default())?;
    let reports = pipeline.run_batch(&SourceRegistry::default(), loaded.records);
    assert_eq!(reports.len(), 2);

    let log = dir.path().join("audit.csv");
    let mut tracker = QualityTracker::new(
        Box::new(CsvAuditStore::new(&log)),
        &TrackerConfig::default(),
    );

    // A directory where the cleaned file should go: the write fails
    let blocked = dir.path().join("cleaned.csv");
    fs::create_dir(&blocked)?;
    assert!(write_and_record(&reports, &blocked, &mut tracker).is_err());
    assert!(tracker.session().is_empty());
    assert!(!log.exists());

    let out = dir.path().join("out").join("cleaned.csv");
    let recorded = write_and_record(&reports, &out, &mut tracker)?;
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].source_id, 1);
    assert_eq!(read_metric_records(&out)?.records.len(), 2);
    assert_eq!(CsvAuditStore::new(&log).all()?.len(), 2);
    Ok(())
}
