//! Flat CSV form of metrics: one row per record, fixed column set.

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::constants::REQUIRED_METRIC_COLUMNS;
use crate::domain::{
    CompanySize, DataQuality, GeographicScope, Metric, MetricFlag, MetricType, Sector, Unit,
};
use crate::error::{MetricsError, Result};
use crate::pipeline::ingestion::read_utf8;
use crate::pipeline::processing::dedup::DedupKey;
use crate::pipeline::processing::validity::MetricView;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    pub value: f64,
    pub unit: Unit,
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub year: Option<i32>,
    pub metric_type: MetricType,
    pub context: String,
    #[serde(deserialize_with = "lenient_int")]
    pub source_id: u32,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub sector: Option<Sector>,
    #[serde(default)]
    pub geographic_scope: Option<GeographicScope>,
    #[serde(default)]
    pub company_size: Option<CompanySize>,
    #[serde(default)]
    pub data_quality: Option<DataQuality>,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub page: Option<u32>,
    #[serde(default)]
    pub extraction_method: String,
    /// `;`-joined [`MetricFlag`] names
    #[serde(default)]
    pub review_flags: String,
}

impl MetricRecord {
    pub fn view(&self) -> MetricView<'_> {
        MetricView {
            value: self.value,
            unit: self.unit,
            year: self.year,
            metric_type: self.metric_type,
            context: &self.context,
        }
    }

    pub fn flags(&self) -> Vec<MetricFlag> {
        MetricFlag::split(&self.review_flags)
    }

    pub fn set_flags(&mut self, flags: &[MetricFlag]) {
        self.review_flags = MetricFlag::join(flags);
    }
}

impl From<&Metric> for MetricRecord {
    fn from(m: &Metric) -> Self {
        Self {
            value: m.value,
            unit: m.unit,
            year: m.year,
            metric_type: m.metric_type,
            context: m.context.clone(),
            source_id: m.source_id,
            confidence: Some(m.confidence),
            sector: m.sector,
            geographic_scope: m.geographic_scope,
            company_size: m.company_size,
            data_quality: Some(m.data_quality),
            description: m.description.clone(),
            page: m.page,
            extraction_method: m.extraction_method.clone(),
            review_flags: MetricFlag::join(&m.flags),
        }
    }
}

impl DedupKey for MetricRecord {
    fn value(&self) -> f64 {
        self.value
    }
    fn unit(&self) -> Unit {
        self.unit
    }
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn context(&self) -> &str {
        &self.context
    }
}

/// Rows that deserialized, plus the per-row failures that were skipped
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<MetricRecord>,
    pub skipped: Vec<MetricsError>,
}

pub fn read_metric_records(path: &Path) -> Result<LoadedRecords> {
    let text = read_utf8(path)?;
    let loaded = parse_metric_records(&text)?;
    info!(
        path = %path.display(),
        records = loaded.records.len(),
        skipped = loaded.skipped.len(),
        "loaded metric records"
    );
    Ok(loaded)
}

/// Parse CSV text. Missing required columns fail the whole file; a bad row is skipped.
pub fn parse_metric_records(text: &str) -> Result<LoadedRecords> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_METRIC_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        return Err(MetricsError::SchemaMismatch(format!(
            "metric file is missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut loaded = LoadedRecords::default();
    for (i, row) in reader.deserialize::<MetricRecord>().enumerate() {
        match row {
            Ok(record) if record.value.is_finite() => loaded.records.push(record),
            Ok(record) => {
                let msg = format!("row {}: non-finite value {}", i + 2, record.value);
                warn!("{}", msg);
                loaded.skipped.push(MetricsError::ParseFailure(msg));
            }
            Err(e) => {
                let msg = format!("row {}: {}", i + 2, e);
                warn!("skipping unparseable record {}", msg);
                loaded.skipped.push(MetricsError::ParseFailure(msg));
            }
        }
    }
    Ok(loaded)
}

pub fn write_metric_records(path: &Path, records: &[MetricRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), records = records.len(), "wrote metric records");
    Ok(())
}

/// Integers written by spreadsheet tools often arrive as "2023.0"
fn parse_integral(raw: &str) -> Option<i64> {
    let f: f64 = raw.trim().parse().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

fn lenient_opt_int<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_integral(s)
            .and_then(|n| T::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid integer '{}'", s))),
    }
}

fn lenient_int<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    lenient_opt_int(deserializer)?.ok_or_else(|| de::Error::custom("missing integer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "value,unit,year,metric_type,context,source_id,confidence,sector,notes\n";

    #[test]
    fn test_parse_with_legacy_labels_and_float_years() {
        let text = format!(
            "{}{}{}",
            HEADER,
            "35,percentage,2023.0,adoption_metric,35% of firms adopted AI,3,0.8,manufacturing,x\n",
            "2.5,usd_billions,,vc_funding,raised $2.5 billion,3,,,\n"
        );
        let loaded = parse_metric_records(&text).unwrap();
        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.records.len(), 2);

        let first = &loaded.records[0];
        assert_eq!(first.year, Some(2023));
        assert_eq!(first.metric_type, MetricType::AdoptionRate);
        assert_eq!(first.sector, Some(Sector::Manufacturing));
        assert_eq!(first.confidence, Some(0.8));
        assert_eq!(loaded.records[1].year, None);
        assert_eq!(loaded.records[1].sector, None);
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let text = format!(
            "{}{}{}",
            HEADER,
            "abc,percentage,2023,adoption_rate,ctx,1,,,\n",
            "12,percentage,2023,adoption_rate,ctx,1,,,\n"
        );
        let loaded = parse_metric_records(&text).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.skipped.len(), 1);
        assert!(matches!(loaded.skipped[0], MetricsError::ParseFailure(_)));
    }

    #[test]
    fn test_missing_columns_is_schema_mismatch() {
        let err = parse_metric_records("value,unit\n1,count\n").unwrap_err();
        assert!(matches!(err, MetricsError::SchemaMismatch(_)));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/metrics.csv");
        let mut record = MetricRecord {
            value: 42.5,
            unit: Unit::Percentage,
            year: Some(2024),
            metric_type: MetricType::Readiness,
            context: "42.5% report \"high\" readiness, overall".to_string(),
            source_id: 4,
            confidence: Some(0.7),
            sector: None,
            geographic_scope: Some(GeographicScope::Global),
            company_size: None,
            data_quality: Some(DataQuality::Medium),
            description: "readiness".to_string(),
            page: Some(12),
            extraction_method: "text_scan".to_string(),
            review_flags: String::new(),
        };
        record.set_flags(&[MetricFlag::RoundNumber]);

        write_metric_records(&path, &[record.clone()]).unwrap();
        let loaded = read_metric_records(&path).unwrap();
        assert_eq!(loaded.records, vec![record]);
        assert_eq!(loaded.records[0].flags(), vec![MetricFlag::RoundNumber]);
    }
}
