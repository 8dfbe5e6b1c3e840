use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::api::query::Filter;
use crate::api::Record;

/// How the non-protected records are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One filtered delete request, all or nothing from the caller's view
    Bulk,
    /// Fetch ids first, then delete one by one with per-record outcomes
    Enumerate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulk => f.write_str("bulk"),
            Self::Enumerate => f.write_str("enumerate"),
        }
    }
}

/// Keys that must never be deleted. Keys are trimmed and compared exactly,
/// matching the server-side filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedSet {
    keys: BTreeSet<String>,
}

impl ProtectedSet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key.trim())
    }

    /// Whether the record is protected. Records without a key never are.
    pub fn protects(&self, record: &Record) -> bool {
        record.key.as_deref().is_some_and(|key| self.contains(key))
    }

    /// Same keys in lowercase, for collections that store keys lowercased
    pub fn lowercased(self) -> Self {
        self.keys.iter().map(|key| key.to_lowercase()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// `column <> key` for a single key, `column NOT IN (...)` otherwise
    pub fn exclusion_filter(&self, column: &str) -> Filter {
        match self.keys.len() {
            1 => Filter::not_eq(column, self.keys.iter().next().cloned().unwrap_or_default()),
            _ => Filter::not_in(column, self.keys.iter()),
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for ProtectedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter
                .into_iter()
                .map(|key| key.as_ref().trim().to_string())
                .filter(|key| !key.is_empty())
                .collect(),
        }
    }
}

impl fmt::Display for ProtectedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.iter().collect();
        f.write_str(&keys.join(", "))
    }
}

/// Records selected for deletion: de-duplicated by id, protected keys removed.
/// Only the exclusion operator builds one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    records: Vec<Record>,
    skipped_protected: usize,
}

impl Targets {
    pub(super) fn select(fetched: Vec<Record>, protected: &ProtectedSet) -> Self {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(fetched.len());
        let mut skipped_protected = 0;

        for record in fetched {
            if protected.protects(&record) {
                skipped_protected += 1;
                continue;
            }
            if seen.insert(record.id.clone()) {
                records.push(record);
            }
        }

        Self {
            records,
            skipped_protected,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fetched records dropped because their key is protected
    pub fn skipped_protected(&self) -> usize {
        self.skipped_protected
    }

    pub(super) fn into_parts(self) -> (Vec<Record>, usize) {
        (self.records, self.skipped_protected)
    }
}

/// Result of deleting one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Failed(String),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub record: Record,
    pub outcome: DeleteOutcome,
}

/// Aggregate result of a purge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every targeted record was deleted
    AllDeleted,
    /// Some records failed; the rest were deleted and stay deleted
    PartialFailure { failed: usize },
    /// Nothing matched the exclusion filter
    Empty,
}

/// What a purge did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionReport {
    pub strategy: Strategy,
    /// Records the purge tried to delete
    pub targeted: usize,
    /// Per-record outcomes, in fetch order (enumerate strategy only)
    pub outcomes: Vec<RecordOutcome>,
    /// Rows the service reported as removed (bulk strategy only)
    pub bulk_deleted: Option<usize>,
    /// Fetched records dropped because their key is protected
    pub skipped_protected: usize,
}

impl ExclusionReport {
    pub fn deleted(&self) -> usize {
        match self.bulk_deleted {
            Some(count) => count,
            None => self
                .outcomes
                .iter()
                .filter(|o| o.outcome.is_deleted())
                .count(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Record, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            DeleteOutcome::Failed(reason) => Some((&o.record, reason.as_str())),
            DeleteOutcome::Deleted => None,
        })
    }

    pub fn outcome(&self) -> BatchOutcome {
        if self.targeted == 0 {
            return BatchOutcome::Empty;
        }
        match self.failures().count() {
            0 => BatchOutcome::AllDeleted,
            failed => BatchOutcome::PartialFailure { failed },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_set_normalizes_keys() {
        let set = ProtectedSet::new([" admin@x.com ", "", "ops@x.com", "admin@x.com"]);

        assert_eq!(set.len(), 2);
        assert!(set.contains("admin@x.com"));
        assert!(set.contains(" ops@x.com"));
        assert!(!set.contains("Admin@x.com"));
        assert_eq!(set.to_string(), "admin@x.com, ops@x.com");
    }

    #[test]
    fn test_lowercased_merges_case_variants() {
        let set = ProtectedSet::new(["Admin@X.com", "admin@x.com", "Ops@x.com"]).lowercased();

        assert_eq!(set.len(), 2);
        assert!(set.contains("admin@x.com"));
        assert!(set.contains("ops@x.com"));
        assert_eq!(
            set.exclusion_filter("email").to_query_string(),
            r#"email=not.in.("admin@x.com","ops@x.com")"#
        );
    }

    #[test]
    fn test_exclusion_filter() {
        let single = ProtectedSet::new(["admin@x.com"]);
        assert_eq!(
            single.exclusion_filter("email").to_query_string(),
            "email=neq.admin@x.com"
        );

        let several = ProtectedSet::new(["admin@x.com", "ops@x.com"]);
        assert_eq!(
            several.exclusion_filter("email").to_query_string(),
            r#"email=not.in.("admin@x.com","ops@x.com")"#
        );
    }

    #[test]
    fn test_records_without_key_are_not_protected() {
        let set = ProtectedSet::new(["admin@x.com"]);
        assert!(set.protects(&Record::new("1", Some("admin@x.com"))));
        assert!(!set.protects(&Record::new("2", None)));
    }

    #[test]
    fn test_targets_drop_protected_and_duplicates() {
        let protected = ProtectedSet::new(["admin@x.com"]);
        let targets = Targets::select(
            vec![
                Record::new("1", Some("a@x.com")),
                Record::new("2", Some("admin@x.com")),
                Record::new("1", Some("a@x.com")),
                Record::new("3", None),
            ],
            &protected,
        );

        assert_eq!(
            targets.records(),
            &[Record::new("1", Some("a@x.com")), Record::new("3", None)]
        );
        assert_eq!(targets.skipped_protected(), 1);
    }

    #[test]
    fn test_report_outcomes() {
        let mut report = ExclusionReport {
            strategy: Strategy::Enumerate,
            targeted: 0,
            outcomes: Vec::new(),
            bulk_deleted: None,
            skipped_protected: 0,
        };
        assert_eq!(report.outcome(), BatchOutcome::Empty);

        report.targeted = 2;
        report.outcomes = vec![
            RecordOutcome {
                record: Record::new("1", Some("a@x.com")),
                outcome: DeleteOutcome::Deleted,
            },
            RecordOutcome {
                record: Record::new("2", Some("b@x.com")),
                outcome: DeleteOutcome::Failed("boom".into()),
            },
        ];
        assert_eq!(report.outcome(), BatchOutcome::PartialFailure { failed: 1 });
        assert_eq!(report.deleted(), 1);
        assert_eq!(report.failures().next().map(|(r, _)| r.label()), Some("b@x.com"));
    }

    #[test]
    fn test_bulk_report() {
        let report = ExclusionReport {
            strategy: Strategy::Bulk,
            targeted: 3,
            outcomes: Vec::new(),
            bulk_deleted: Some(3),
            skipped_protected: 0,
        };
        assert_eq!(report.outcome(), BatchOutcome::AllDeleted);
        assert_eq!(report.deleted(), 3);
    }
}
