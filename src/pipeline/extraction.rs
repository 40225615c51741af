//! Page text to metrics: scan, classify, filter, dedup.

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::domain::{merge_flags, Candidate, Metric, PageText, Source};
use crate::error::Result;
use crate::pipeline::processing::classifier::Classifier;
use crate::pipeline::processing::dedup::Deduplicator;
use crate::pipeline::processing::scanner::Scanner;
use crate::pipeline::processing::validity::{Rejection, RejectionKind, ValidityFilter, Verdict};

/// A candidate that did not make it into the output, and why
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCandidate {
    pub candidate: Candidate,
    pub reason: Rejection,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub metrics: Vec<Metric>,
    pub rejected: Vec<RejectedCandidate>,
    pub candidates_scanned: usize,
}

pub struct Extractor {
    scanner: Scanner,
    classifier: Classifier,
    filter: ValidityFilter,
    dedup: Deduplicator,
}

impl Extractor {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            scanner: Scanner::new(&config.scanner)?,
            classifier: Classifier::new(config.classifier.clone()),
            filter: ValidityFilter::new(config.validity.clone())?,
            dedup: Deduplicator::new(&config.dedup),
        })
    }

    pub fn extract(&self, source: &Source, pages: &[PageText]) -> ExtractionOutcome {
        let document = source.file_path.to_string_lossy();
        let mut outcome = ExtractionOutcome::default();
        let mut accepted: Vec<(Metric, Candidate)> = Vec::new();

        for page in pages {
            for candidate in self.scanner.scan_page(&page.text, &document, Some(page.page)) {
                outcome.candidates_scanned += 1;
                let classification = self.classifier.classify_candidate(&candidate);
                let mut metric = self.classifier.build_metric(&candidate, classification, source);

                match self.filter.check((&metric).into()) {
                    Verdict::Reject(reason) => {
                        debug!(page = page.page, raw = %candidate.raw_text, %reason, "candidate rejected");
                        outcome.rejected.push(RejectedCandidate { candidate, reason });
                    }
                    Verdict::Review(flags) => {
                        merge_flags(&mut metric.flags, &flags);
                        accepted.push((metric, candidate));
                    }
                    Verdict::Accept => accepted.push((metric, candidate)),
                }
            }
        }

        let metrics: Vec<&Metric> = accepted.iter().map(|(m, _)| m).collect();
        let dedup = self.dedup.run(&metrics);
        for dup in &dedup.removed {
            outcome.rejected.push(RejectedCandidate {
                candidate: accepted[dup.index].1.clone(),
                reason: Rejection {
                    kind: RejectionKind::Duplicate,
                    detail: format!("repeats candidate {}", dup.kept_index),
                },
            });
        }
        outcome.metrics = dedup
            .kept
            .iter()
            .map(|&i| accepted[i].0.clone())
            .collect();

        info!(
            source_id = source.id,
            pages = pages.len(),
            candidates = outcome.candidates_scanned,
            metrics = outcome.metrics.len(),
            rejected = outcome.rejected.len(),
            "extraction complete"
        );
        outcome
    }
}
