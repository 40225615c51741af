use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::app::ports::AuditStore;
use crate::constants::QUALITY_RECORD_COLUMNS;
use crate::error::{MetricsError, Result};
use crate::pipeline::ingestion::read_utf8;
use crate::tracker::QualityRecord;

/// Flat CSV implementation of AuditStore.
/// The header is written with the first row; each later call appends one full row.
pub struct CsvAuditStore {
    path: PathBuf,
}

impl CsvAuditStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn expected_header() -> String {
        QUALITY_RECORD_COLUMNS.join(",")
    }

    /// True when a non-empty file does not end with a line break
    fn missing_final_newline(&self) -> Result<bool> {
        let mut file = fs::File::open(&self.path)?;
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }

    /// Compare an existing file's header to the expected column set
    fn check_existing_header(&self) -> Result<()> {
        let file = fs::File::open(&self.path)?;
        let mut first = String::new();
        BufReader::new(file).read_line(&mut first)?;
        let found = first.trim_end_matches(['\r', '\n']);
        if found != Self::expected_header() {
            return Err(MetricsError::SchemaMismatch(format!(
                "{} has header '{}'",
                self.path.display(),
                found
            )));
        }
        Ok(())
    }
}

impl AuditStore for CsvAuditStore {
    fn append(&self, record: &QualityRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let mut bytes = Vec::new();
        if !needs_header {
            self.check_existing_header()?;
            if self.missing_final_newline()? {
                bytes.push(b'\n');
            }
        }

        // Serialize the whole row before touching the file
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(bytes);
        if needs_header {
            writer.write_record(QUALITY_RECORD_COLUMNS)?;
        }
        writer.serialize(record)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| MetricsError::Io(e.into_error()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_data()?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "appended audit row");
        Ok(())
    }

    fn all(&self) -> Result<Vec<QualityRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = read_utf8(&self.path)?;
        let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        let missing: Vec<&str> = QUALITY_RECORD_COLUMNS
            .iter()
            .copied()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .collect();
        if !missing.is_empty() {
            return Err(MetricsError::SchemaMismatch(format!(
                "{} is missing columns: {}",
                self.path.display(),
                missing.join(", ")
            )));
        }

        let mut records = Vec::new();
        for (i, row) in reader.deserialize::<QualityRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!(row = i + 2, error = %e, "skipping unreadable audit row"),
            }
        }
        Ok(records)
    }
}
