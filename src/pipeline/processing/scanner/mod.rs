//! Text Candidate Scanner
//!
//! Keyword-gated numeric token scanning. A span is scanned only when it
//! contains one of a target's keywords; every number in it then becomes a
//! [`Candidate`] carrying a window of surrounding words.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use crate::config::{ScanTarget, ScannerConfig};
use crate::constants::{METHOD_PATTERN_PREFIX, METHOD_TEXT_SCAN};
use crate::domain::Candidate;
use crate::error::{MetricsError, Result};
use crate::metrics::ScannerMetrics;

/// Optional `$`, a number with optional thousands separators and decimals, optional unit word
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\$)?\s?\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(%|percent\b|billion\b|bn\b|million\b|mn\b|usd\b|companies\b|firms\b|businesses\b|employees\b|workers\b|years?\b)?",
    )
    .unwrap()
});

/// A unit word directly after a number
static TRAILING_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?i)\s*(%|percent\b|billion\b|bn\b|million\b|mn\b|usd\b|companies\b|firms\b|businesses\b|employees\b|workers\b|years?\b)",
    )
    .unwrap()
});

static YEAR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());

/// "et al., 2019", "(Smith, 2020)", "Smith (2020)"
static CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:et al\.?,?\s*\(?|\(\s*[A-Z][A-Za-z&.\- ]*,\s*|[A-Z][A-Za-z\-]+\s+\()((?:19|20)\d{2})",
    )
    .unwrap()
});

const CANDIDATE_YEAR_MIN: i32 = 2010;
const CANDIDATE_YEAR_MAX: i32 = 2030;

/// A scan target with its extra patterns compiled
#[derive(Debug, Clone)]
pub struct CompiledTarget {
    pub target: ScanTarget,
    keywords_lower: Vec<String>,
    patterns: Vec<Regex>,
    expected_units: HashSet<String>,
}

impl CompiledTarget {
    pub fn compile(target: &ScanTarget) -> Result<Self> {
        let patterns = target
            .patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            target: target.clone(),
            keywords_lower: target.keywords.iter().map(|k| k.to_lowercase()).collect(),
            patterns,
            expected_units: target
                .expected_units
                .iter()
                .map(|u| normalize_unit_hint(u))
                .collect(),
        })
    }

    /// Coarse gate: case-insensitive substring match on any keyword
    pub fn matches_span(&self, span: &str) -> bool {
        let lower = span.to_lowercase();
        self.keywords_lower.iter().any(|k| lower.contains(k.as_str()))
    }

    fn accepts_unit(&self, hint: Option<&str>) -> bool {
        match hint {
            Some(h) if !self.expected_units.is_empty() => self.expected_units.contains(h),
            _ => true,
        }
    }
}

pub struct Scanner {
    targets: Vec<CompiledTarget>,
    context_words: usize,
    max_context_chars: usize,
}

impl Scanner {
    pub fn new(config: &ScannerConfig) -> Result<Self> {
        if config.targets.is_empty() {
            return Err(MetricsError::Config(
                "scanner needs at least one target".to_string(),
            ));
        }
        let targets = config
            .targets
            .iter()
            .map(CompiledTarget::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            targets,
            context_words: config.context_words,
            max_context_chars: config.max_context_chars,
        })
    }

    pub fn targets(&self) -> &[CompiledTarget] {
        &self.targets
    }

    /// Scan a whole page: split into sentence spans and run every target over each
    pub fn scan_page(&self, text: &str, document: &str, page: Option<u32>) -> Vec<Candidate> {
        let mut out = Vec::new();
        for span in split_spans(text) {
            for target in &self.targets {
                out.extend(self.scan_span(span, target, document, page));
            }
        }
        debug!(
            document,
            page = page.unwrap_or(0),
            candidates = out.len(),
            "scanned page"
        );
        out
    }

    /// Produce the candidates one target finds in one span. Never fails; malformed
    /// tokens are skipped.
    pub fn scan_span(
        &self,
        span: &str,
        target: &CompiledTarget,
        document: &str,
        page: Option<u32>,
    ) -> Vec<Candidate> {
        if !target.matches_span(span) {
            return Vec::new();
        }

        let mut out = Vec::new();
        // Every number the token scan looked at, emitted or not
        let mut token_ranges: Vec<(usize, usize)> = Vec::new();

        for caps in NUMERIC_TOKEN.captures_iter(span) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            token_ranges.push((number.start(), number.end()));
            let has_dollar = caps.get(1).is_some();
            let hint = caps
                .get(3)
                .map(|m| normalize_unit_hint(m.as_str()))
                .or_else(|| has_dollar.then(|| "usd".to_string()));

            if hint.is_none() && looks_like_year(number.as_str()) {
                continue;
            }
            if !target.accepts_unit(hint.as_deref()) {
                debug!(token = whole.as_str(), target = %target.target.name, "unit hint not expected for target");
                continue;
            }
            let Some(value) = parse_number(number.as_str()) else {
                continue;
            };

            out.push(self.candidate(
                span,
                whole.start(),
                whole.end(),
                value,
                hint,
                target,
                document,
                page,
                METHOD_TEXT_SCAN.to_string(),
            ));
        }

        for (i, pattern) in target.patterns.iter().enumerate() {
            for caps in pattern.captures_iter(span) {
                let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let (start, end) = (number.start(), number.end());
                if token_ranges.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                let hint = caps
                    .get(2)
                    .map(|m| normalize_unit_hint(m.as_str()))
                    .or_else(|| trailing_unit(&span[end..]));
                if !target.accepts_unit(hint.as_deref()) {
                    debug!(token = whole.as_str(), target = %target.target.name, "unit hint not expected for target");
                    continue;
                }
                let Some(value) = parse_number(number.as_str()) else {
                    continue;
                };
                token_ranges.push((start, end));
                out.push(self.candidate(
                    span,
                    whole.start(),
                    whole.end(),
                    value,
                    hint,
                    target,
                    document,
                    page,
                    format!("{}:{}#{}", METHOD_PATTERN_PREFIX, target.target.name, i),
                ));
            }
        }

        ScannerMetrics::record_span_scanned(out.len());
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn candidate(
        &self,
        span: &str,
        start: usize,
        end: usize,
        value: f64,
        unit_hint: Option<String>,
        target: &CompiledTarget,
        document: &str,
        page: Option<u32>,
        extraction_method: String,
    ) -> Candidate {
        let context = self.context_window(span, start, end);
        Candidate {
            value,
            raw_text: span[start..end].trim().to_string(),
            unit_hint,
            year: extract_year(&context),
            context,
            document: document.to_string(),
            page,
            extraction_method,
            prior_label: target.target.metric_type,
        }
    }

    fn context_window(&self, span: &str, start: usize, end: usize) -> String {
        let before: Vec<&str> = span[..start].split_whitespace().collect();
        let after: Vec<&str> = span[end..].split_whitespace().collect();
        let skip = before.len().saturating_sub(self.context_words);

        let mut words: Vec<&str> = before[skip..].to_vec();
        words.push(span[start..end].trim());
        words.extend(after.iter().take(self.context_words));

        truncate_chars(&words.join(" "), self.max_context_chars)
    }
}

/// Canonical unit hint: lower-case, with common spellings folded
pub fn normalize_unit_hint(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "percent" => "%".to_string(),
        "bn" => "billion".to_string(),
        "mn" => "million".to_string(),
        "year" => "years".to_string(),
        _ => lower,
    }
}

fn trailing_unit(rest: &str) -> Option<String> {
    TRAILING_UNIT
        .captures(rest)
        .and_then(|c| c.get(1))
        .map(|m| normalize_unit_hint(m.as_str()))
}

/// First year in the context that is in range and not part of a citation
pub fn extract_year(context: &str) -> Option<i32> {
    let cited: HashSet<usize> = CITATION
        .captures_iter(context)
        .filter_map(|c| c.get(1).map(|m| m.start()))
        .collect();

    YEAR_TOKEN
        .captures_iter(context)
        .filter_map(|c| c.get(1))
        .filter(|m| !cited.contains(&m.start()))
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .find(|y| (CANDIDATE_YEAR_MIN..=CANDIDATE_YEAR_MAX).contains(y))
}

/// Split page text into sentence-like spans
pub fn split_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '.' | '!' | '?' => chars.peek().is_some_and(|(_, next)| next.is_whitespace()),
            '\n' => chars.peek().is_some_and(|(_, next)| *next == '\n'),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            let span = text[start..end].trim();
            if !span.is_empty() {
                spans.push(span);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        spans.push(tail);
    }
    spans
}

fn parse_number(token: &str) -> Option<f64> {
    let cleaned = token.replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!(token, "numeric token failed to parse; skipping");
            ScannerMetrics::record_parse_failure();
            None
        }
    }
}

fn looks_like_year(token: &str) -> bool {
    token.len() == 4
        && token
            .parse::<i32>()
            .map(|y| (1900..=2099).contains(&y))
            .unwrap_or(false)
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
