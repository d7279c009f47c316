//! Tag records and the per-document code index.

use crate::context::{ContextClassifier, EligibilityPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scale applied when a tag carries no `ADECIMAL` attribute (millions of won).
pub const DEFAULT_DECIMAL_SCALE: i32 = -6;

/// Normalizes an `ACODE` for comparison.
///
/// Matching is case-insensitive and treats the taxonomy separator `:` the same
/// as `_`, so `ifrs-full:Equity`, `ifrs-full_Equity` and `IFRS-FULL_EQUITY`
/// all normalize to `ifrs-full_equity`.
pub fn normalize_code(code: &str) -> String {
    code.trim().replace(':', "_").to_lowercase()
}

/// A single tagged value extracted from a filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// The `ACODE` as spelled in the document
    pub code: String,

    /// The `ACONTEXT` reference (empty when absent)
    pub context_ref: String,

    /// Power-of-ten scale from `ADECIMAL`
    pub decimal_scale: i32,

    /// Displayed value text, trimmed
    pub raw_value: String,

    /// Position of the tag among all code-bearing tags in the document
    pub ordinal: usize,
}

impl TagRecord {
    /// Returns true if the displayed value carries no figure (empty or `-`).
    pub fn is_blank(&self) -> bool {
        let value = self.raw_value.trim();
        value.is_empty() || value == "-"
    }

    /// Parses an `ADECIMAL` attribute value.
    ///
    /// A missing attribute means millions; an unreadable one (such as `INF`)
    /// leaves the value unscaled.
    pub fn parse_decimal_scale(attr: Option<&str>) -> i32 {
        attr.map_or(DEFAULT_DECIMAL_SCALE, |value| {
            value.trim().parse().unwrap_or(0)
        })
    }
}

/// Counters produced when a code index is narrowed to eligible contexts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Records whose context is eligible for the target year
    pub eligible_tags: usize,
    /// Records discarded by the context check
    pub rejected_tags: usize,
    /// Eligible records whose value is blank
    pub blank_values: usize,
    /// Distinct codes left in the narrowed index
    pub code_index_size: usize,
}

/// Mapping from normalized code to the tag records carrying it, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeIndex {
    entries: BTreeMap<String, Vec<TagRecord>>,
    records: usize,
}

impl CodeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record under its normalized code.
    pub fn insert(&mut self, record: TagRecord) {
        self.entries
            .entry(normalize_code(&record.code))
            .or_default()
            .push(record);
        self.records += 1;
    }

    /// Records for an already normalized code.
    pub fn get(&self, normalized_code: &str) -> &[TagRecord] {
        self.entries
            .get(normalized_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records for a code in any spelling.
    pub fn get_code(&self, code: &str) -> &[TagRecord] {
        self.get(&normalize_code(code))
    }

    /// Number of distinct codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no record was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of records across all codes.
    pub const fn record_count(&self) -> usize {
        self.records
    }

    /// Distinct normalized codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over `(normalized code, records)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TagRecord])> {
        self.entries
            .iter()
            .map(|(code, records)| (code.as_str(), records.as_slice()))
    }

    /// Builds a new index holding only records whose context is eligible
    /// for `fiscal_year` under `policy`.
    pub fn filter_eligible(
        &self,
        classifier: &ContextClassifier,
        fiscal_year: i32,
        policy: &EligibilityPolicy,
    ) -> (Self, FilterStats) {
        let mut narrowed = Self::new();
        let mut stats = FilterStats::default();

        for records in self.entries.values() {
            for record in records {
                let kind = classifier.classify(&record.context_ref, fiscal_year);
                if !policy.is_eligible(&kind) {
                    stats.rejected_tags += 1;
                    continue;
                }
                stats.eligible_tags += 1;
                if record.is_blank() {
                    stats.blank_values += 1;
                }
                narrowed.insert(record.clone());
            }
        }

        stats.code_index_size = narrowed.len();
        (narrowed, stats)
    }
}

impl Extend<TagRecord> for CodeIndex {
    fn extend<I: IntoIterator<Item = TagRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<TagRecord> for CodeIndex {
    fn from_iter<I: IntoIterator<Item = TagRecord>>(iter: I) -> Self {
        let mut index = Self::new();
        index.extend(iter);
        index
    }
}
