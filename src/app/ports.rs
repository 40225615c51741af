use crate::error::Result;
use crate::tracker::QualityRecord;

/// Append-only store behind the quality tracker. Rows are only ever inserted;
/// there is no key, no update and no delete.
pub trait AuditStore: Send + Sync {
    /// Durably append one record. Must not leave a partial row on failure.
    fn append(&self, record: &QualityRecord) -> Result<()>;

    /// Every stored record in insertion order
    fn all(&self) -> Result<Vec<QualityRecord>>;
}
