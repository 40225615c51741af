//! Domain data shapes shared by the scanner, classifier, filter, deduplicator and tracker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Closed set of metric categories.
///
/// Older exports used ad hoc labels such as `adoption_metric`; those are
/// accepted on input and normalized to the variants below.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    #[serde(alias = "adoption_metric")]
    AdoptionRate,
    #[serde(alias = "cost_metric")]
    CostReduction,
    #[serde(alias = "readiness_metric")]
    Readiness,
    VcFunding,
    Investment,
    ProductivityGain,
    LaborMarket,
    MarketSize,
    GeneralRate,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::AdoptionRate => "adoption_rate",
            MetricType::CostReduction => "cost_reduction",
            MetricType::Readiness => "readiness",
            MetricType::VcFunding => "vc_funding",
            MetricType::Investment => "investment",
            MetricType::ProductivityGain => "productivity_gain",
            MetricType::LaborMarket => "labor_market",
            MetricType::MarketSize => "market_size",
            MetricType::GeneralRate => "general_rate",
        }
    }

    /// Types whose values are money amounts
    pub fn is_financial(&self) -> bool {
        matches!(
            self,
            MetricType::VcFunding | MetricType::Investment | MetricType::MarketSize
        )
    }

    /// Unit assumed when the text carries no unit hint and the type is not financial
    pub fn default_unit(&self) -> Unit {
        match self {
            MetricType::AdoptionRate
            | MetricType::CostReduction
            | MetricType::Readiness
            | MetricType::ProductivityGain
            | MetricType::GeneralRate => Unit::Percentage,
            MetricType::LaborMarket => Unit::Count,
            MetricType::VcFunding | MetricType::Investment | MetricType::MarketSize => {
                Unit::UsdMillions
            }
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[serde(alias = "%", alias = "percent")]
    Percentage,
    #[serde(alias = "millions", alias = "usd_million")]
    UsdMillions,
    #[serde(alias = "billions", alias = "usd_billion")]
    UsdBillions,
    Count,
    Years,
    Ratio,
    #[serde(other)]
    Unknown,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Percentage => "percentage",
            Unit::UsdMillions => "usd_millions",
            Unit::UsdBillions => "usd_billions",
            Unit::Count => "count",
            Unit::Years => "years",
            Unit::Ratio => "ratio",
            Unit::Unknown => "unknown",
        }
    }

    pub fn is_monetary(&self) -> bool {
        matches!(self, Unit::UsdMillions | Unit::UsdBillions)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GeographicScope {
    Global,
    UnitedStates,
    UnitedKingdom,
    Europe,
    China,
    AsiaPacific,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Technology,
    FinancialServices,
    Healthcare,
    Manufacturing,
    Retail,
    ProfessionalServices,
    Education,
    Government,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    Sme,
    MidMarket,
    Large,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    High,
    Medium,
    Low,
}

impl DataQuality {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            DataQuality::High
        } else if confidence >= 0.6 {
            DataQuality::Medium
        } else {
            DataQuality::Low
        }
    }
}

/// Markers attached to a metric so downstream consumers can filter on them
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricFlag {
    /// No classification rule matched
    ManualReview,
    /// Unit chosen by the magnitude heuristic rather than read from the text
    InferredUnit,
    RoundNumber,
    SmallCount,
    /// Value matches a compound term but also a firm-size phrase
    AmbiguousCompoundTerm,
}

impl MetricFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricFlag::ManualReview => "manual_review",
            MetricFlag::InferredUnit => "inferred_unit",
            MetricFlag::RoundNumber => "round_number",
            MetricFlag::SmallCount => "small_count",
            MetricFlag::AmbiguousCompoundTerm => "ambiguous_compound_term",
        }
    }

    /// Join flags into the `;`-separated form used in CSV exports
    pub fn join(flags: &[MetricFlag]) -> String {
        flags
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Parse the `;`-separated form, ignoring unknown entries
    pub fn split(joined: &str) -> Vec<MetricFlag> {
        joined
            .split(';')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }
}

impl FromStr for MetricFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_review" => Ok(MetricFlag::ManualReview),
            "inferred_unit" => Ok(MetricFlag::InferredUnit),
            "round_number" => Ok(MetricFlag::RoundNumber),
            "small_count" => Ok(MetricFlag::SmallCount),
            "ambiguous_compound_term" => Ok(MetricFlag::AmbiguousCompoundTerm),
            other => Err(format!("unknown metric flag '{}'", other)),
        }
    }
}

/// Merge `extra` into `flags` without duplicating entries
pub fn merge_flags(flags: &mut Vec<MetricFlag>, extra: &[MetricFlag]) {
    for flag in extra {
        if !flags.contains(flag) {
            flags.push(*flag);
        }
    }
}

/// A provisional numeric extraction from page text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub value: f64,
    /// The matched token, e.g. "$2.5 billion"
    pub raw_text: String,
    /// Lower-cased unit token following the number, if any
    pub unit_hint: Option<String>,
    /// Words surrounding the match, bounded in length
    pub context: String,
    pub year: Option<i32>,
    pub document: String,
    pub page: Option<u32>,
    pub extraction_method: String,
    /// Label carried before classification; the scan target's type, or `general_rate`
    pub prior_label: MetricType,
}

/// A validated, classified extraction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub value: f64,
    pub unit: Unit,
    pub metric_type: MetricType,
    pub year: Option<i32>,
    pub geographic_scope: Option<GeographicScope>,
    pub sector: Option<Sector>,
    pub company_size: Option<CompanySize>,
    pub confidence: f64,
    pub data_quality: DataQuality,
    pub description: String,
    pub context: String,
    pub source_id: u32,
    pub page: Option<u32>,
    pub extraction_method: String,
    pub flags: Vec<MetricFlag>,
}

/// An input document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub id: u32,
    pub name: String,
    pub file_path: PathBuf,
}

impl Source {
    /// Placeholder for sources missing from the registry
    pub fn unregistered(id: u32) -> Self {
        Self {
            id,
            name: format!("source_{}", id),
            file_path: PathBuf::new(),
        }
    }
}

/// Text of one page as handed back by the PDF extraction tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_metric_labels_are_accepted() {
        let t: MetricType = serde_json::from_str("\"adoption_metric\"").unwrap();
        assert_eq!(t, MetricType::AdoptionRate);
        let t: MetricType = serde_json::from_str("\"cost_metric\"").unwrap();
        assert_eq!(t, MetricType::CostReduction);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"cost_reduction\"");
    }

    #[test]
    fn test_unit_aliases_and_unknown() {
        let u: Unit = serde_json::from_str("\"%\"").unwrap();
        assert_eq!(u, Unit::Percentage);
        let u: Unit = serde_json::from_str("\"furlongs\"").unwrap();
        assert_eq!(u, Unit::Unknown);
    }

    #[test]
    fn test_flags_join_and_split() {
        let flags = vec![MetricFlag::ManualReview, MetricFlag::InferredUnit];
        let joined = MetricFlag::join(&flags);
        assert_eq!(joined, "manual_review;inferred_unit");
        assert_eq!(MetricFlag::split(&joined), flags);
        assert!(MetricFlag::split("").is_empty());
    }

    #[test]
    fn test_data_quality_tiers() {
        assert_eq!(DataQuality::from_confidence(0.9), DataQuality::High);
        assert_eq!(DataQuality::from_confidence(0.6), DataQuality::Medium);
        assert_eq!(DataQuality::from_confidence(0.2), DataQuality::Low);
    }
}
