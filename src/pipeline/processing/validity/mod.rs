//! Validity Filter
//!
//! Static range, artifact and consistency rules. A rejection is a normal
//! outcome carrying a reason; ambiguous values are flagged for review
//! instead of being removed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ValidityConfig;
use crate::domain::{Metric, MetricFlag, MetricType, Unit};
use crate::error::Result;
use crate::metrics::ValidityMetrics;

/// The fields the filter looks at
#[derive(Debug, Clone, Copy)]
pub struct MetricView<'a> {
    pub value: f64,
    pub unit: Unit,
    pub year: Option<i32>,
    pub metric_type: MetricType,
    pub context: &'a str,
}

impl<'a> From<&'a Metric> for MetricView<'a> {
    fn from(m: &'a Metric) -> Self {
        Self {
            value: m.value,
            unit: m.unit,
            year: m.year,
            metric_type: m.metric_type,
            context: &m.context,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    PercentageOutOfRange,
    YearOutOfRange,
    CompoundTermArtifact,
    ImplausibleMagnitude,
    CategoryUnitMismatch,
    Duplicate,
}

impl RejectionKind {
    /// Short human-readable label, used as the audit log's top removal reason
    pub fn label(&self) -> &'static str {
        match self {
            RejectionKind::PercentageOutOfRange => "percentage outside 0-100",
            RejectionKind::YearOutOfRange => "year outside valid range",
            RejectionKind::CompoundTermArtifact => "compound-term artifact",
            RejectionKind::ImplausibleMagnitude => "implausibly small amount",
            RejectionKind::CategoryUnitMismatch => "category/unit mismatch",
            RejectionKind::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub detail: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.detail)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    /// Kept, with flags for manual review
    Review(Vec<MetricFlag>),
    Reject(Rejection),
}

impl Verdict {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Verdict::Reject(_))
    }

    pub fn flags(&self) -> &[MetricFlag] {
        match self {
            Verdict::Review(flags) => flags,
            _ => &[],
        }
    }
}

struct CompiledTerm {
    label: String,
    pattern: Regex,
    values: Vec<f64>,
}

pub struct ValidityFilter {
    config: ValidityConfig,
    terms: Vec<CompiledTerm>,
    size_phrase: Regex,
}

impl ValidityFilter {
    pub fn new(config: ValidityConfig) -> Result<Self> {
        let terms = config
            .compound_terms
            .iter()
            .map(|t| -> Result<CompiledTerm> {
                Ok(CompiledTerm {
                    label: t.label.clone(),
                    pattern: Regex::new(&t.pattern)?,
                    values: t.values.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let size_phrase = Regex::new(&config.size_phrase_pattern)?;
        Ok(Self {
            config,
            terms,
            size_phrase,
        })
    }

    pub fn check(&self, m: MetricView<'_>) -> Verdict {
        let verdict = self.evaluate(m);
        match &verdict {
            Verdict::Accept => ValidityMetrics::record_accept(),
            Verdict::Review(_) => ValidityMetrics::record_review(),
            Verdict::Reject(_) => ValidityMetrics::record_reject(),
        }
        verdict
    }

    fn evaluate(&self, m: MetricView<'_>) -> Verdict {
        if m.unit == Unit::Percentage && !(0.0..=100.0).contains(&m.value) {
            return reject(
                RejectionKind::PercentageOutOfRange,
                format!("percentage value {} outside [0, 100]", m.value),
            );
        }

        if let Some(year) = m.year {
            if year < self.config.year_min || year > self.config.year_max {
                return reject(
                    RejectionKind::YearOutOfRange,
                    format!(
                        "year {} outside [{}, {}]",
                        year, self.config.year_min, self.config.year_max
                    ),
                );
            }
        }

        let mut flags = Vec::new();

        for term in &self.terms {
            if !term.values.iter().any(|v| same_number(*v, m.value)) {
                continue;
            }
            if !term.pattern.is_match(m.context) {
                continue;
            }
            if self.in_size_phrase(m.value, m.context) {
                if !flags.contains(&MetricFlag::AmbiguousCompoundTerm) {
                    flags.push(MetricFlag::AmbiguousCompoundTerm);
                }
                continue;
            }
            return reject(
                RejectionKind::CompoundTermArtifact,
                format!(
                    "value {} matches compound term '{}' (pattern {})",
                    m.value,
                    term.label,
                    term.pattern.as_str()
                ),
            );
        }

        if m.unit == Unit::UsdBillions && m.value < self.config.min_usd_billions {
            return reject(
                RejectionKind::ImplausibleMagnitude,
                format!(
                    "{} billion USD is below {}",
                    m.value, self.config.min_usd_billions
                ),
            );
        }

        if m.metric_type == MetricType::LaborMarket && m.unit.is_monetary() {
            return reject(
                RejectionKind::CategoryUnitMismatch,
                format!("labor_market metric with monetary unit {}", m.unit),
            );
        }

        if self.config.flag_round_numbers && m.value >= 100.0 && m.value % 100.0 == 0.0 {
            flags.push(MetricFlag::RoundNumber);
        }
        if m.unit == Unit::Count && m.value < self.config.small_count_threshold {
            flags.push(MetricFlag::SmallCount);
        }

        if flags.is_empty() {
            Verdict::Accept
        } else {
            Verdict::Review(flags)
        }
    }

    /// True when the value also appears as a firm-size phrase such as "fewer than 500 employees"
    fn in_size_phrase(&self, value: f64, context: &str) -> bool {
        self.size_phrase
            .captures_iter(context)
            .filter_map(|c| c.get(1))
            .filter_map(|n| n.as_str().replace(',', "").parse::<f64>().ok())
            .any(|n| same_number(n, value))
    }
}

fn reject(kind: RejectionKind, detail: String) -> Verdict {
    Verdict::Reject(Rejection { kind, detail })
}

fn same_number(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
