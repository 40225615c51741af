use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use econ_metrics::config::PipelineConfig;
use econ_metrics::infra::CsvAuditStore;
use econ_metrics::pipeline::ingestion::read_pages;
use econ_metrics::pipeline::{
    read_metric_records, write_and_record, write_metric_records, CleanupPipeline, Extractor,
    MetricRecord,
};
use econ_metrics::registry::SourceRegistry;
use econ_metrics::tracker::{ExportFormat, QualityTracker, Trends};
use econ_metrics::{logging, metrics};

#[derive(Parser)]
#[command(name = "econ_metrics")]
#[command(about = "Extract economic metrics from report text and track data quality per source")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file (defaults to $ECON_METRICS_CONFIG, then built-in tables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan page text for candidate metrics and write them as CSV
    Extract {
        /// UTF-8 text with pages separated by form feeds
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        source_id: u32,
        /// Source registry CSV (id,name,file_path)
        #[arg(long)]
        sources: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate, re-classify and dedupe a metrics CSV, recording one audit row per source
    Cleanup {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        sources: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Export a run summary: json, text or both
        #[arg(long)]
        export: Option<ExportFormat>,
    },
    /// Show the audit history of one source
    History {
        #[arg(long)]
        source_id: u32,
    },
    /// Aggregate quality trends over the whole audit log
    Trends,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    metrics::init_metrics();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path),
        None => PipelineConfig::from_env(),
    }
    .context("loading pipeline configuration")?;

    match cli.command {
        Commands::Extract {
            input,
            source_id,
            sources,
            output,
        } => run_extract(&config, &input, source_id, sources.as_deref(), output),
        Commands::Cleanup {
            input,
            sources,
            output,
            export,
        } => run_cleanup(&config, &input, sources.as_deref(), output, export),
        Commands::History { source_id } => run_history(&config, source_id),
        Commands::Trends => run_trends(&config),
    }
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<SourceRegistry> {
    match path {
        Some(p) => SourceRegistry::load(p)
            .with_context(|| format!("loading source registry {}", p.display())),
        None => Ok(SourceRegistry::default()),
    }
}

fn open_tracker(config: &PipelineConfig) -> QualityTracker {
    let store = CsvAuditStore::new(config.tracker.audit_log_path.clone());
    QualityTracker::new(Box::new(store), &config.tracker)
}

fn run_extract(
    config: &PipelineConfig,
    input: &Path,
    source_id: u32,
    sources: Option<&Path>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let registry = load_registry(sources)?;
    let mut source = registry.resolve(source_id);
    if source.file_path.as_os_str().is_empty() {
        source.file_path = input.to_path_buf();
    }

    let span = tracing::info_span!("extract", source_id, source = %source.name);
    let _enter = span.enter();

    let pages = read_pages(input).with_context(|| format!("reading {}", input.display()))?;
    let extractor = Extractor::new(config).context("building extractor")?;
    let outcome = extractor.extract(&source, &pages);

    let output = output
        .unwrap_or_else(|| PathBuf::from(format!("output/metrics_source_{}.csv", source_id)));
    let rows: Vec<MetricRecord> = outcome.metrics.iter().map(MetricRecord::from).collect();
    write_metric_records(&output, &rows)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("📄 {} ({} pages)", source.name, pages.len());
    println!("   Candidates scanned: {}", outcome.candidates_scanned);
    println!("   Metrics kept: {}", outcome.metrics.len());
    println!("   Rejected: {}", outcome.rejected.len());
    println!("   Output file: {}", output.display());
    Ok(())
}

fn run_cleanup(
    config: &PipelineConfig,
    input: &Path,
    sources: Option<&Path>,
    output: Option<PathBuf>,
    export: Option<ExportFormat>,
) -> anyhow::Result<()> {
    let registry = load_registry(sources)?;
    let loaded =
        read_metric_records(input).with_context(|| format!("reading {}", input.display()))?;
    if !loaded.skipped.is_empty() {
        warn!(skipped = loaded.skipped.len(), "some rows could not be parsed");
    }

    let pipeline = CleanupPipeline::new(config).context("building cleanup pipeline")?;
    let reports = pipeline.run_batch(&registry, loaded.records);

    let output = output.unwrap_or_else(|| cleaned_path(input));
    let mut tracker = open_tracker(config);
    let recorded = write_and_record(&reports, &output, &mut tracker)
        .with_context(|| format!("writing {} and recording quality", output.display()))?;

    println!("🧹 Cleaned {} sources from {}", reports.len(), input.display());
    for record in &recorded {
        println!(
            "   [{}] {}: kept {}/{}, modified {}, score {:.2}",
            record.source_id,
            record.source_name,
            record.kept_records,
            record.total_records,
            record.modified_records,
            record.quality_score
        );
    }
    println!("   Output file: {}", output.display());

    if let Some(format) = export {
        for path in tracker.export_summary(format).context("exporting summary")? {
            println!("   Summary: {}", path.display());
        }
    }
    info!(run_id = %tracker.run_id(), "cleanup run finished");
    Ok(())
}

fn cleaned_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "metrics".to_string());
    input.with_file_name(format!("{}_cleaned.csv", stem))
}

fn run_history(config: &PipelineConfig, source_id: u32) -> anyhow::Result<()> {
    let tracker = open_tracker(config);
    let mut any = false;
    for r in tracker.history(source_id) {
        any = true;
        println!(
            "{}  {:>6.2}  total={} removed={} modified={}  {}",
            r.timestamp.to_rfc3339(),
            r.quality_score,
            r.total_records,
            r.removed_records,
            r.modified_records,
            r.top_removal_reason.as_deref().unwrap_or("-")
        );
    }
    if !any {
        println!("No audit history for source {}", source_id);
    }
    Ok(())
}

fn run_trends(config: &PipelineConfig) -> anyhow::Result<()> {
    match open_tracker(config).trends() {
        Trends::NoData => println!("No quality data recorded yet"),
        report @ Trends::Report(_) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
