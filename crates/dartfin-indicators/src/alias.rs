//! Alias table: canonical indicator name to the codes that report it.
//!
//! Issuers and taxonomy revisions spell the same line item differently
//! (`ifrs-full_ShorttermBorrowings`, `dart_ShortTermBorrowings`,
//! `ifrs-full:ShortTermBorrowings`). Each canonical indicator carries a
//! primary code and any number of candidates; all of them are compared in
//! normalized form.
//!
//! The table is loaded once, validated, and then shared read-only.

use crate::error::{AliasError, Result};
use dartfin_xbrl::normalize_code;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Built-in table shipped with the crate.
const BUILTIN_TABLE: &str = include_str!("../data/acode_mappings.json");

/// On-disk shape of one table entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AliasEntry {
    #[serde(alias = "primary_acode")]
    primary_code: String,
    #[serde(default, alias = "candidate_acodes")]
    candidate_codes: Vec<String>,
    #[serde(default)]
    description: String,
}

/// Codes for one canonical indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorAlias {
    /// Canonical indicator name
    pub name: String,
    /// Preferred code
    pub primary_code: String,
    /// Naming variants
    pub candidate_codes: Vec<String>,
    /// Human readable description
    pub description: String,
    #[serde(skip)]
    normalized: Vec<String>,
}

impl IndicatorAlias {
    /// Creates an alias, validating and normalizing its codes.
    pub fn new(
        name: impl Into<String>,
        primary_code: impl Into<String>,
        candidate_codes: Vec<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AliasError::BlankIndicator);
        }
        let primary_code = primary_code.into();
        if primary_code.trim().is_empty() {
            return Err(AliasError::BlankPrimaryCode { indicator: name });
        }
        if candidate_codes.iter().any(|code| code.trim().is_empty()) {
            return Err(AliasError::BlankCandidateCode { indicator: name });
        }

        let mut alias = Self {
            name,
            primary_code,
            candidate_codes,
            description: description.into(),
            normalized: Vec::new(),
        };
        alias.normalize();
        Ok(alias)
    }

    fn normalize(&mut self) {
        self.normalized.clear();
        for code in std::iter::once(&self.primary_code).chain(&self.candidate_codes) {
            let code = normalize_code(code);
            if !self.normalized.contains(&code) {
                self.normalized.push(code);
            }
        }
    }

    /// Normalized codes, primary first, without duplicates.
    pub fn codes(&self) -> &[String] {
        &self.normalized
    }

    /// Returns true if `code` in any spelling belongs to this indicator.
    pub fn matches(&self, code: &str) -> bool {
        let code = normalize_code(code);
        self.normalized.contains(&code)
    }
}

/// Immutable mapping from canonical indicator name to [`IndicatorAlias`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, IndicatorAlias>,
}

impl AliasTable {
    /// Loads the table embedded in the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_TABLE)
    }

    /// Parses a JSON object keyed by indicator name.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, AliasEntry> = serde_json::from_str(json)?;
        Self::from_aliases(raw.into_iter().map(|(name, entry)| {
            IndicatorAlias::new(
                name,
                entry.primary_code,
                entry.candidate_codes,
                entry.description,
            )
        }))
    }

    /// Reads a JSON table from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| AliasError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Builds a table from validated aliases. Any error aborts the load.
    pub fn from_aliases<I>(aliases: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<IndicatorAlias>>,
    {
        let entries = aliases
            .into_iter()
            .map(|alias| alias.map(|alias| (alias.name.clone(), alias)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        if entries.is_empty() {
            return Err(AliasError::Empty);
        }
        Ok(Self { entries })
    }

    /// Returns a copy of the table with one more candidate code for `indicator`.
    pub fn with_candidate(mut self, indicator: &str, code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        let alias = self
            .entries
            .get_mut(indicator)
            .ok_or_else(|| AliasError::UnknownIndicator(indicator.to_string()))?;
        if code.trim().is_empty() {
            return Err(AliasError::BlankCandidateCode {
                indicator: indicator.to_string(),
            });
        }
        alias.candidate_codes.push(code);
        alias.normalize();
        Ok(self)
    }

    /// Looks up an indicator by canonical name.
    pub fn get(&self, indicator: &str) -> Option<&IndicatorAlias> {
        self.entries.get(indicator)
    }

    /// Iterates over aliases in name order.
    pub fn iter(&self) -> impl Iterator<Item = &IndicatorAlias> {
        self.entries.values()
    }

    /// Canonical indicator names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of indicators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a loaded table.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
