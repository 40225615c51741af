use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{CompanySize, GeographicScope, MetricType, Sector};
use crate::error::{MetricsError, Result};

/// Environment variable naming a TOML config file
pub const CONFIG_ENV_VAR: &str = "ECON_METRICS_CONFIG";

/// Top-level configuration. Every keyword table the pipeline consults lives here
/// and is handed to the stage constructors, so tests can swap in fixtures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scanner: ScannerConfig,
    pub classifier: ClassifierConfig,
    pub validity: ValidityConfig,
    pub dedup: DedupConfig,
    pub tracker: TrackerConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MetricsError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `ECON_METRICS_CONFIG` when set, otherwise use the built-in tables
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => Ok(Self::default()),
        }
    }
}

/// What the scanner looks for in a span of text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTarget {
    pub name: String,
    pub metric_type: MetricType,
    /// A span is scanned only if it contains one of these (case-insensitive)
    pub keywords: Vec<String>,
    /// Extra regexes; capture 1 is the value, optional capture 2 the unit hint
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Unit hints accepted for this target; empty accepts any
    #[serde(default)]
    pub expected_units: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Words kept on each side of a match
    pub context_words: usize,
    pub max_context_chars: usize,
    pub targets: Vec<ScanTarget>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            context_words: 12,
            max_context_chars: 300,
            targets: vec![
                ScanTarget {
                    name: "ai_adoption".to_string(),
                    metric_type: MetricType::AdoptionRate,
                    keywords: strings(&["adopt", "implement", "deploy", "using ai", "use ai"]),
                    patterns: Vec::new(),
                    expected_units: strings(&["%", "percent", "companies", "firms", "businesses"]),
                },
                ScanTarget {
                    name: "vc_funding".to_string(),
                    metric_type: MetricType::VcFunding,
                    keywords: strings(&["venture capital", "vc funding", "funding", "raised"]),
                    patterns: strings(&[
                        r"(?i)raised\s+(?:a\s+total\s+of\s+)?\$?(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(billion|million)?",
                    ]),
                    expected_units: strings(&["billion", "million", "usd"]),
                },
                ScanTarget {
                    name: "cost_reduction".to_string(),
                    metric_type: MetricType::CostReduction,
                    keywords: strings(&["cost", "saving", "roi"]),
                    patterns: Vec::new(),
                    expected_units: strings(&["%", "percent", "billion", "million", "usd"]),
                },
                ScanTarget {
                    name: "labor_market".to_string(),
                    metric_type: MetricType::LaborMarket,
                    keywords: strings(&["job", "employ", "worker", "workforce", "hiring"]),
                    patterns: Vec::new(),
                    expected_units: Vec::new(),
                },
                ScanTarget {
                    name: "productivity".to_string(),
                    metric_type: MetricType::ProductivityGain,
                    keywords: strings(&["productivity", "efficiency"]),
                    patterns: Vec::new(),
                    expected_units: strings(&["%", "percent"]),
                },
            ],
        }
    }
}

/// One ordered classification rule; the first rule with a keyword in the context wins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub metric_type: MetricType,
    pub keywords: Vec<String>,
}

/// Keyword list that tags a metric with one dimension value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionRule<T> {
    pub tag: T,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub rules: Vec<ClassificationRule>,
    pub hedging_terms: Vec<String>,
    pub geography: Vec<DimensionRule<GeographicScope>>,
    pub sectors: Vec<DimensionRule<Sector>>,
    pub company_sizes: Vec<DimensionRule<CompanySize>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                rule(
                    MetricType::VcFunding,
                    &["venture capital", "vc funding", "funding round", "raised"],
                ),
                rule(MetricType::AdoptionRate, &["adopt", "implement", "deploy"]),
                rule(MetricType::CostReduction, &["cost", "roi", "investment", "saving"]),
                rule(MetricType::Readiness, &["readiness", "maturity", "stage"]),
                rule(MetricType::ProductivityGain, &["productivity", "efficiency"]),
                rule(
                    MetricType::LaborMarket,
                    &["job", "employment", "workforce", "hiring", "wage", "labor", "labour"],
                ),
                rule(
                    MetricType::MarketSize,
                    &["market size", "market value", "valued at", "revenue"],
                ),
            ],
            hedging_terms: strings(&["might", "could", "possibly", "perhaps"]),
            geography: vec![
                dim(GeographicScope::Global, &["global", "worldwide"]),
                dim(GeographicScope::UnitedStates, &["united states", "u.s.", "american"]),
                dim(GeographicScope::UnitedKingdom, &["united kingdom", "u.k.", "britain", "british"]),
                dim(GeographicScope::Europe, &["europe", "european"]),
                dim(GeographicScope::China, &["china", "chinese"]),
                dim(GeographicScope::AsiaPacific, &["asia", "apac"]),
            ],
            sectors: vec![
                dim(Sector::FinancialServices, &["financial services", "banking", "bank", "insurance", "fintech"]),
                dim(Sector::Healthcare, &["healthcare", "health care", "hospital", "medical"]),
                dim(Sector::Manufacturing, &["manufactur", "factory", "factories"]),
                dim(Sector::Retail, &["retail", "e-commerce"]),
                dim(Sector::Education, &["education", "school", "universit"]),
                dim(Sector::Government, &["government", "public sector"]),
                dim(Sector::ProfessionalServices, &["consulting", "professional services", "legal"]),
                dim(Sector::Technology, &["technology", "software", "tech sector"]),
            ],
            company_sizes: vec![
                dim(CompanySize::Sme, &["smes", "small business", "small and medium", "small firms", "startups"]),
                dim(CompanySize::MidMarket, &["mid-size", "midsize", "mid-market", "medium-sized"]),
                dim(CompanySize::Large, &["large enterprise", "large companies", "large firms", "fortune 500"]),
            ],
        }
    }
}

/// A term with an embedded number that the scanner picks up by accident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundTerm {
    pub label: String,
    pub pattern: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityConfig {
    pub year_min: i32,
    pub year_max: i32,
    pub min_usd_billions: f64,
    pub small_count_threshold: f64,
    pub flag_round_numbers: bool,
    pub compound_terms: Vec<CompoundTerm>,
    /// Firm-size phrase; capture 1 is the number. A match with the candidate's
    /// value overrides a compound-term rejection.
    pub size_phrase_pattern: String,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            year_min: 2010,
            year_max: 2030,
            min_usd_billions: 0.01,
            small_count_threshold: 20.0,
            flag_round_numbers: true,
            compound_terms: vec![
                term("COVID-19", r"(?i)\bcovid[-\s]?19\b", &[19.0]),
                term("Fortune 500", r"(?i)\bfortune\s+500\b", &[500.0]),
                term("Fortune 1000", r"(?i)\bfortune\s+1000\b", &[1000.0]),
                term("S&P 500", r"(?i)\bs&p\s+500\b", &[500.0]),
                term("401(k)", r"(?i)\b401\(k\)", &[401.0]),
                term("24/7", r"\b24/7\b", &[24.0, 7.0]),
                term("Industry 4.0", r"(?i)\bindustry\s+4\.0\b", &[4.0]),
                term("Web 3.0", r"(?i)\bweb\s*3(?:\.0)?\b", &[3.0]),
                term("5G", r"(?i)\b5g\b", &[5.0]),
            ],
            size_phrase_pattern: r"(?i)\b(?:fewer than|less than|under|more than|over|at least)?\s*(\d[\d,]*)\s+(?:employees|workers|staff)\b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Characters compared at the start and end of each context
    pub context_window: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { context_window: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub audit_log_path: PathBuf,
    pub reports_dir: PathBuf,
    pub schema_version: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            audit_log_path: PathBuf::from("output/quality_audit_log.csv"),
            reports_dir: PathBuf::from("output/reports"),
            schema_version: "v2".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn rule(metric_type: MetricType, keywords: &[&str]) -> ClassificationRule {
    ClassificationRule {
        metric_type,
        keywords: strings(keywords),
    }
}

fn dim<T>(tag: T, keywords: &[&str]) -> DimensionRule<T> {
    DimensionRule {
        tag,
        keywords: strings(keywords),
    }
}

fn term(label: &str, pattern: &str, values: &[f64]) -> CompoundTerm {
    CompoundTerm {
        label: label.to_string(),
        pattern: pattern.to_string(),
        values: values.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_src = r#"
            [dedup]
            context_window = 30

            [tracker]
            schema_version = "v9"
        "#;
        let config: PipelineConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.dedup.context_window, 30);
        assert_eq!(config.tracker.schema_version, "v9");
        assert_eq!(
            config.tracker.audit_log_path,
            PathBuf::from("output/quality_audit_log.csv")
        );
        assert_eq!(config.validity.year_min, 2010);
        assert!(!config.classifier.rules.is_empty());
    }

    #[test]
    fn test_load_custom_rules_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[classifier]
hedging_terms = ["maybe"]

[[classifier.rules]]
metric_type = "readiness_metric"
keywords = ["pilot"]
"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.classifier.rules.len(), 1);
        assert_eq!(config.classifier.rules[0].metric_type, MetricType::Readiness);
        assert_eq!(config.classifier.hedging_terms, vec!["maybe".to_string()]);
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let err = PipelineConfig::load(Path::new("/nonexistent/econ.toml")).unwrap_err();
        assert!(matches!(err, MetricsError::Config(_)));
    }
}
