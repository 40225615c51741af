use std::sync::Mutex;

use crate::app::ports::AuditStore;
use crate::error::{MetricsError, Result};
use crate::tracker::QualityRecord;

/// In-memory audit store for development/testing
#[derive(Default)]
pub struct InMemoryAuditStore {
    records: Mutex<Vec<QualityRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<QualityRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, record: &QualityRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| MetricsError::Config("audit store lock poisoned".to_string()))?;
        records.push(record.clone());
        Ok(())
    }

    fn all(&self) -> Result<Vec<QualityRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| MetricsError::Config("audit store lock poisoned".to_string()))?;
        Ok(records.clone())
    }
}
