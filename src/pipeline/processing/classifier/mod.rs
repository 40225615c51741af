//! Metric Classifier
//!
//! Ordered keyword-containment rules over the lower-cased context. The first
//! matching rule decides the metric type; unmatched candidates keep their
//! prior label and are flagged for manual review.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::{ClassifierConfig, DimensionRule};
use crate::domain::{
    merge_flags, Candidate, CompanySize, DataQuality, GeographicScope, Metric, MetricFlag,
    MetricType, Sector, Source, Unit,
};
use crate::metrics::ClassifierMetrics;

static EXPLICIT_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?\s*%").unwrap());

const BASE_CONFIDENCE: f64 = 0.5;
const KEYWORD_BONUS: f64 = 0.1;
const EXPLICIT_PERCENT_BONUS: f64 = 0.2;
const HEDGING_PENALTY: f64 = 0.2;
const INFERRED_UNIT_PENALTY: f64 = 0.1;

/// Result of classifying one value in its context
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub metric_type: MetricType,
    pub unit: Unit,
    pub geographic_scope: Option<GeographicScope>,
    pub sector: Option<Sector>,
    pub company_size: Option<CompanySize>,
    pub confidence: f64,
    /// Set when a rule matched; `false` means the prior label was kept
    pub matched_rule: bool,
    pub flags: Vec<MetricFlag>,
}

/// How a unit was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSource {
    Hint,
    /// Magnitude heuristic for financial types
    Magnitude,
    TypeDefault,
}

pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let mut config = config;
        lowercase_keywords(&mut config);
        Self { config }
    }

    /// Map `(raw_value, unit_hint, context)` to a classification
    pub fn classify(
        &self,
        value: f64,
        unit_hint: Option<&str>,
        context: &str,
        prior_label: MetricType,
    ) -> Classification {
        let lower = context.to_lowercase();

        let matched = self.config.rules.iter().find_map(|rule| {
            let hits = rule
                .keywords
                .iter()
                .filter(|k| lower.contains(k.as_str()))
                .count();
            (hits > 0).then_some((rule.metric_type, hits))
        });

        let (metric_type, keyword_hits, matched_rule) = match matched {
            Some((t, hits)) => (t, hits, true),
            None => (prior_label, 0, false),
        };

        let mut confidence = BASE_CONFIDENCE + KEYWORD_BONUS * keyword_hits as f64;
        if EXPLICIT_PERCENT.is_match(context) {
            confidence += EXPLICIT_PERCENT_BONUS;
        }
        if self
            .config
            .hedging_terms
            .iter()
            .any(|h| lower.contains(h.as_str()))
        {
            confidence -= HEDGING_PENALTY;
        }

        let mut flags = Vec::new();
        if !matched_rule {
            flags.push(MetricFlag::ManualReview);
        }

        let (unit, unit_source) = infer_unit(value, unit_hint, metric_type, prior_label);
        if unit_source == UnitSource::Magnitude {
            debug!(value, %metric_type, %unit, "unit inferred from magnitude");
            confidence -= INFERRED_UNIT_PENALTY;
            flags.push(MetricFlag::InferredUnit);
        }

        let confidence = confidence.clamp(0.0, 1.0);
        ClassifierMetrics::record_classification(
            matched_rule,
            unit_source == UnitSource::Magnitude,
            confidence,
        );

        Classification {
            metric_type,
            unit,
            geographic_scope: first_tag(&self.config.geography, &lower),
            sector: first_tag(&self.config.sectors, &lower),
            company_size: first_tag(&self.config.company_sizes, &lower),
            confidence,
            matched_rule,
            flags,
        }
    }

    pub fn classify_candidate(&self, candidate: &Candidate) -> Classification {
        self.classify(
            candidate.value,
            candidate.unit_hint.as_deref(),
            &candidate.context,
            candidate.prior_label,
        )
    }

    /// Combine a candidate and its classification into a Metric
    pub fn build_metric(
        &self,
        candidate: &Candidate,
        classification: Classification,
        source: &Source,
    ) -> Metric {
        let mut flags = Vec::new();
        merge_flags(&mut flags, &classification.flags);
        Metric {
            value: candidate.value,
            unit: classification.unit,
            metric_type: classification.metric_type,
            year: candidate.year,
            geographic_scope: classification.geographic_scope,
            sector: classification.sector,
            company_size: classification.company_size,
            confidence: classification.confidence,
            data_quality: DataQuality::from_confidence(classification.confidence),
            description: format!("{} ({})", classification.metric_type, candidate.raw_text),
            context: candidate.context.clone(),
            source_id: source.id,
            page: candidate.page,
            extraction_method: candidate.extraction_method.clone(),
            flags,
        }
    }
}

/// Decide the unit. Explicit hints map directly. Financial types without a
/// magnitude word fall back to the magnitude heuristic: above 1000 is read
/// as millions, below 100 as billions, anything between as millions. The
/// heuristic misreads some values; callers see it through `UnitSource::Magnitude`.
pub fn infer_unit(
    value: f64,
    unit_hint: Option<&str>,
    metric_type: MetricType,
    prior_label: MetricType,
) -> (Unit, UnitSource) {
    match unit_hint.map(str::to_lowercase).as_deref() {
        Some("%") | Some("percent") => return (Unit::Percentage, UnitSource::Hint),
        Some("billion") | Some("bn") => return (Unit::UsdBillions, UnitSource::Hint),
        Some("million") | Some("mn") => return (Unit::UsdMillions, UnitSource::Hint),
        Some("companies") | Some("firms") | Some("businesses") | Some("employees")
        | Some("workers") => return (Unit::Count, UnitSource::Hint),
        Some("years") | Some("year") => return (Unit::Years, UnitSource::Hint),
        _ => {}
    }

    if metric_type.is_financial() || prior_label.is_financial() {
        let unit = if value > 1000.0 {
            Unit::UsdMillions
        } else if value < 100.0 {
            Unit::UsdBillions
        } else {
            Unit::UsdMillions
        };
        return (unit, UnitSource::Magnitude);
    }

    (metric_type.default_unit(), UnitSource::TypeDefault)
}

fn first_tag<T: Copy>(rules: &[DimensionRule<T>], lower_context: &str) -> Option<T> {
    rules
        .iter()
        .find(|r| r.keywords.iter().any(|k| lower_context.contains(k.as_str())))
        .map(|r| r.tag)
}

fn lowercase_keywords(config: &mut ClassifierConfig) {
    for rule in &mut config.rules {
        rule.keywords.iter_mut().for_each(|k| *k = k.to_lowercase());
    }
    config
        .hedging_terms
        .iter_mut()
        .for_each(|k| *k = k.to_lowercase());
    for r in &mut config.geography {
        r.keywords.iter_mut().for_each(|k| *k = k.to_lowercase());
    }
    for r in &mut config.sectors {
        r.keywords.iter_mut().for_each(|k| *k = k.to_lowercase());
    }
    for r in &mut config.company_sizes {
        r.keywords.iter_mut().for_each(|k| *k = k.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassificationRule;

    fn classifier() -> Classifier {
        Classifier::new(ClassifierConfig::default())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let c = classifier().classify(
            42.0,
            Some("%"),
            "42% of firms plan to deploy AI to cut cost",
            MetricType::GeneralRate,
        );
        // adoption rule precedes the cost rule
        assert_eq!(c.metric_type, MetricType::AdoptionRate);
        assert_eq!(c.unit, Unit::Percentage);
        assert!(c.matched_rule);
        assert!(c.flags.is_empty());
    }

    #[test]
    fn test_confidence_adjustments() {
        // one keyword, explicit percent: 0.5 + 0.1 + 0.2
        let c = classifier().classify(30.0, Some("%"), "30% adoption", MetricType::GeneralRate);
        assert!(approx(c.confidence, 0.8));

        // hedged: 0.5 + 0.1 + 0.2 - 0.2
        let c = classifier().classify(
            30.0,
            Some("%"),
            "30% adoption could follow",
            MetricType::GeneralRate,
        );
        assert!(approx(c.confidence, 0.6));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let config = ClassifierConfig {
            rules: vec![ClassificationRule {
                metric_type: MetricType::AdoptionRate,
                keywords: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into(), "f".into()],
            }],
            ..ClassifierConfig::default()
        };
        let c = Classifier::new(config).classify(
            10.0,
            Some("%"),
            "abcdef 10%",
            MetricType::GeneralRate,
        );
        assert!(approx(c.confidence, 1.0));
    }

    #[test]
    fn test_unmatched_keeps_prior_label_and_flags_review() {
        let c = classifier().classify(12.0, None, "a figure of 12 appears", MetricType::GeneralRate);
        assert_eq!(c.metric_type, MetricType::GeneralRate);
        assert!(!c.matched_rule);
        assert_eq!(c.flags, vec![MetricFlag::ManualReview]);
        assert!(approx(c.confidence, 0.5));
    }

    #[test]
    fn test_magnitude_heuristic_is_flagged() {
        let (unit, src) = infer_unit(2500.0, None, MetricType::VcFunding, MetricType::VcFunding);
        assert_eq!((unit, src), (Unit::UsdMillions, UnitSource::Magnitude));
        let (unit, _) = infer_unit(45.0, Some("usd"), MetricType::VcFunding, MetricType::GeneralRate);
        assert_eq!(unit, Unit::UsdBillions);

        let c = classifier().classify(
            45.0,
            None,
            "startups raised 45 in venture capital",
            MetricType::GeneralRate,
        );
        assert_eq!(c.metric_type, MetricType::VcFunding);
        assert_eq!(c.unit, Unit::UsdBillions);
        assert!(c.flags.contains(&MetricFlag::InferredUnit));
        // two keywords, inferred unit penalty: 0.5 + 0.2 - 0.1
        assert!(approx(c.confidence, 0.6));
    }

    #[test]
    fn test_hint_beats_heuristic() {
        let (unit, src) = infer_unit(45.0, Some("million"), MetricType::VcFunding, MetricType::VcFunding);
        assert_eq!((unit, src), (Unit::UsdMillions, UnitSource::Hint));
        let (unit, src) = infer_unit(3.0, None, MetricType::LaborMarket, MetricType::GeneralRate);
        assert_eq!((unit, src), (Unit::Count, UnitSource::TypeDefault));
    }

    #[test]
    fn test_dimensions() {
        let c = classifier().classify(
            18.0,
            Some("%"),
            "18% of European manufacturing SMEs have adopted AI",
            MetricType::GeneralRate,
        );
        assert_eq!(c.geographic_scope, Some(GeographicScope::Europe));
        assert_eq!(c.sector, Some(Sector::Manufacturing));
        assert_eq!(c.company_size, Some(CompanySize::Sme));
    }

    #[test]
    fn test_build_metric() {
        let candidate = Candidate {
            value: 35.0,
            raw_text: "35%".to_string(),
            unit_hint: Some("%".to_string()),
            context: "35% of firms adopted AI in 2023".to_string(),
            year: Some(2023),
            document: "doc".to_string(),
            page: Some(2),
            extraction_method: "text_scan".to_string(),
            prior_label: MetricType::AdoptionRate,
        };
        let cls = classifier();
        let classification = cls.classify_candidate(&candidate);
        let metric = cls.build_metric(&candidate, classification, &Source::unregistered(7));
        assert_eq!(metric.source_id, 7);
        assert_eq!(metric.metric_type, MetricType::AdoptionRate);
        assert_eq!(metric.year, Some(2023));
        assert_eq!(metric.data_quality, DataQuality::High);
        assert_eq!(metric.description, "adoption_rate (35%)");
    }
}
