//! Deduplicator
//!
//! Groups one source's records by exact `(value, unit, year)`. The earliest
//! member of a group is always kept. Later members are removed when their
//! context starts or ends like a kept member's context.

use std::collections::HashMap;
use tracing::debug;

use crate::config::DedupConfig;
use crate::domain::{Metric, Unit};
use crate::metrics::DedupMetrics;

/// Fields the deduplicator groups and compares on
pub trait DedupKey {
    fn value(&self) -> f64;
    fn unit(&self) -> Unit;
    fn year(&self) -> Option<i32>;
    fn context(&self) -> &str;
}

impl<T: DedupKey + ?Sized> DedupKey for &T {
    fn value(&self) -> f64 {
        (**self).value()
    }
    fn unit(&self) -> Unit {
        (**self).unit()
    }
    fn year(&self) -> Option<i32> {
        (**self).year()
    }
    fn context(&self) -> &str {
        (**self).context()
    }
}

impl DedupKey for Metric {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GroupKey {
    value_bits: u64,
    unit: Unit,
    year: Option<i32>,
}

impl GroupKey {
    fn of<T: DedupKey>(record: &T) -> Self {
        let value = record.value();
        // -0.0 and 0.0 belong to the same group
        let value = if value == 0.0 { 0.0 } else { value };
        Self {
            value_bits: value.to_bits(),
            unit: record.unit(),
            year: record.year(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateRemoval {
    pub index: usize,
    /// The kept record this one duplicates
    pub kept_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Indices to keep, ascending
    pub kept: Vec<usize>,
    pub removed: Vec<DuplicateRemoval>,
    /// Groups with more than one member
    pub duplicate_groups: usize,
    pub largest_group: usize,
}

pub struct Deduplicator {
    window: usize,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            window: config.context_window,
        }
    }

    pub fn run<T: DedupKey>(&self, records: &[T]) -> DedupOutcome {
        let mut group_sizes: HashMap<GroupKey, usize> = HashMap::new();
        let mut kept_by_group: HashMap<GroupKey, Vec<usize>> = HashMap::new();
        let mut outcome = DedupOutcome::default();

        for (i, record) in records.iter().enumerate() {
            let key = GroupKey::of(record);
            *group_sizes.entry(key).or_insert(0) += 1;

            let kept = kept_by_group.entry(key).or_default();
            let duplicate_of = kept
                .iter()
                .copied()
                .find(|&k| self.same_context(records[k].context(), record.context()));

            match duplicate_of {
                Some(kept_index) => outcome.removed.push(DuplicateRemoval {
                    index: i,
                    kept_index,
                }),
                None => {
                    kept.push(i);
                    outcome.kept.push(i);
                }
            }
        }

        outcome.duplicate_groups = group_sizes.values().filter(|&&n| n > 1).count();
        outcome.largest_group = group_sizes.values().copied().max().unwrap_or(0);

        debug!(
            input = records.len(),
            kept = outcome.kept.len(),
            removed = outcome.removed.len(),
            groups = outcome.duplicate_groups,
            "deduplicated records"
        );
        DedupMetrics::record_run(records.len(), outcome.duplicate_groups, outcome.removed.len());
        outcome
    }

    /// Contexts match when their first or last `window` characters are equal
    fn same_context(&self, a: &str, b: &str) -> bool {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        prefix(&a, self.window) == prefix(&b, self.window)
            || suffix(&a, self.window) == suffix(&b, self.window)
    }
}

fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn suffix(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    struct Row {
        value: f64,
        unit: Unit,
        year: Option<i32>,
        context: String,
    }

    impl DedupKey for Row {
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

    fn row(value: f64, unit: Unit, year: Option<i32>, context: &str) -> Row {
        Row {
            value,
            unit,
            year,
            context: context.to_string(),
        }
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(&DedupConfig::default())
    }

    #[test]
    fn test_keeps_earliest_of_identical_contexts() {
        let rows = vec![
            row(35.0, Unit::Percentage, Some(2023), "35% of firms adopted AI"),
            row(12.0, Unit::Percentage, Some(2023), "12% cut costs"),
            row(35.0, Unit::Percentage, Some(2023), "35% of firms adopted AI"),
            row(35.0, Unit::Percentage, Some(2023), "  35% OF FIRMS ADOPTED AI "),
        ];
        let out = dedup().run(&rows);
        assert_eq!(out.kept, vec![0, 1]);
        assert_eq!(
            out.removed,
            vec![
                DuplicateRemoval { index: 2, kept_index: 0 },
                DuplicateRemoval { index: 3, kept_index: 0 },
            ]
        );
        assert_eq!(out.duplicate_groups, 1);
        assert_eq!(out.largest_group, 3);
    }

    #[test]
    fn test_substantially_different_context_is_kept() {
        let rows = vec![
            row(35.0, Unit::Percentage, None, "35% of retailers adopted chatbots for support"),
            row(35.0, Unit::Percentage, None, "Banks reported that 35% of back-office tasks are automated"),
        ];
        let out = dedup().run(&rows);
        assert_eq!(out.kept, vec![0, 1]);
        assert!(out.removed.is_empty());
        assert_eq!(out.duplicate_groups, 1);
    }

    #[test]
    fn test_shared_prefix_or_suffix_counts_as_duplicate() {
        let long_prefix = "According to the 2024 survey of European manufacturers, 40% ";
        let rows = vec![
            row(40.0, Unit::Percentage, Some(2024), &format!("{}use AI daily", long_prefix)),
            row(40.0, Unit::Percentage, Some(2024), &format!("{}plan pilots", long_prefix)),
            row(40.0, Unit::Percentage, Some(2024), "a different opening entirely ... plan pilots"),
        ];
        let out = dedup().run(&rows);
        // row 1 shares the first 50 chars with row 0; row 2 shares its ending with row 1,
        // but row 1 was removed, so it is compared only against kept row 0
        assert_eq!(out.kept, vec![0, 2]);
        assert_eq!(out.removed, vec![DuplicateRemoval { index: 1, kept_index: 0 }]);
    }

    #[test]
    fn test_unit_and_year_split_groups() {
        let rows = vec![
            row(5.0, Unit::Percentage, Some(2023), "same"),
            row(5.0, Unit::UsdBillions, Some(2023), "same"),
            row(5.0, Unit::Percentage, Some(2024), "same"),
            row(5.0, Unit::Percentage, None, "same"),
            row(-0.0, Unit::Percentage, None, "zero"),
            row(0.0, Unit::Percentage, None, "zero"),
        ];
        let out = dedup().run(&rows);
        assert_eq!(out.kept, vec![0, 1, 2, 3, 4]);
        assert_eq!(out.removed, vec![DuplicateRemoval { index: 5, kept_index: 4 }]);
    }

    #[test]
    fn test_every_value_class_survives() {
        let contexts = ["alpha", "beta", "alpha", "gamma", "alpha"];
        let mut rows = Vec::new();
        for (i, ctx) in contexts.iter().cycle().take(40).enumerate() {
            let value = (i % 4) as f64;
            let year = if i % 3 == 0 { Some(2020) } else { None };
            rows.push(row(value, Unit::Percentage, year, ctx));
        }
        let out = dedup().run(&rows);

        let all: HashSet<GroupKey> = rows.iter().map(GroupKey::of).collect();
        let kept: HashSet<GroupKey> = out.kept.iter().map(|&i| GroupKey::of(&rows[i])).collect();
        assert_eq!(all, kept);

        // the first member of every group is kept
        let mut seen = HashSet::new();
        for (i, r) in rows.iter().enumerate() {
            if seen.insert(GroupKey::of(r)) {
                assert!(out.kept.contains(&i));
            }
        }
        assert_eq!(out.kept.len() + out.removed.len(), rows.len());
    }

    #[test]
    fn test_prefix_suffix_are_char_safe() {
        assert_eq!(prefix("héllo wörld", 4), "héll");
        assert_eq!(suffix("héllo wörld", 4), "örld");
        assert_eq!(suffix("ab", 4), "ab");
    }

    #[test]
    fn test_empty_input() {
        let out = dedup().run::<Row>(&[]);
        assert_eq!(out, DedupOutcome::default());
    }
}
