/// Column set of the quality audit log, in file order
pub const QUALITY_RECORD_COLUMNS: [&str; 16] = [
    "timestamp",
    "run_id",
    "source_id",
    "source_name",
    "schema_version",
    "total_records",
    "kept_records",
    "removed_records",
    "modified_records",
    "removal_rate",
    "modification_rate",
    "quality_score",
    "duplicate_groups",
    "duplicates_removed",
    "largest_duplicate_group",
    "top_removal_reason",
];

/// Columns a metric CSV must carry; the rest are optional
pub const REQUIRED_METRIC_COLUMNS: [&str; 6] =
    ["value", "unit", "year", "metric_type", "context", "source_id"];

// Extraction method tags
pub const METHOD_TEXT_SCAN: &str = "text_scan";
pub const METHOD_PATTERN_PREFIX: &str = "pattern";
pub const METHOD_RECLASSIFIED: &str = "reclassified";

/// Page separator emitted by pdftotext
pub const PAGE_SEPARATOR: char = '\x0c';

/// File name stem for exported run summaries
pub const SUMMARY_FILE_STEM: &str = "quality_summary";
