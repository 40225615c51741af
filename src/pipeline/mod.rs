// Metric pipeline: page ingestion, the processing stages, and the two runs built from them

pub mod cleanup;
pub mod extraction;
pub mod ingestion;
pub mod processing;
pub mod records;

pub use cleanup::{
    group_by_source, write_and_record, CleanupPipeline, CleanupReport, RemovedRecord,
};
pub use extraction::{ExtractionOutcome, Extractor, RejectedCandidate};
pub use records::{read_metric_records, write_metric_records, LoadedRecords, MetricRecord};
