//! Resolution of canonical indicators from a document's code index.
//!
//! For every indicator in the [`AliasTable`] the resolver looks up all of its
//! normalized codes, keeps records whose context is eligible for the target
//! fiscal year and whose value is not blank, and takes the one that appears
//! first in the document. That record's value is normalized to won.
//!
//! Resolution is a pure function of the index, the table, the year and the
//! eligibility policy.

use crate::alias::{AliasTable, IndicatorAlias};
use crate::value::normalize_value;
use dartfin_xbrl::{CodeIndex, ContextClassifier, EligibilityPolicy, TagRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Why an indicator has no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Absence {
    /// None of the indicator's codes occur in the document
    CodeAbsent,
    /// Codes occur, but only in contexts outside the target year or period kinds
    ContextIneligible,
    /// Eligible records exist, but all of them show a blank value
    BlankValue,
    /// The selected record's value is not a number
    Unparsable {
        /// Code of the selected record
        code: String,
        /// Displayed value
        raw: String,
    },
}

/// Outcome for one indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndicatorValue {
    /// Value in won
    Found {
        /// Normalized amount
        value: i64,
    },
    /// No usable value; never the same thing as zero
    NotFound(Absence),
}

impl IndicatorValue {
    /// Creates a found value.
    pub const fn found(value: i64) -> Self {
        Self::Found { value }
    }

    /// Returns the amount, if one was found.
    pub const fn value(&self) -> Option<i64> {
        match self {
            Self::Found { value } => Some(*value),
            Self::NotFound(_) => None,
        }
    }

    /// Returns true if a value was found.
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Amount with not-found read as zero, for consumers that need a number.
    pub fn or_zero(&self) -> i64 {
        self.value().unwrap_or(0)
    }
}

/// Resolved values for every indicator of an alias table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIndicators {
    /// Fiscal year the values belong to
    pub fiscal_year: i32,
    /// Indicator name to outcome, one entry per table entry
    pub values: BTreeMap<String, IndicatorValue>,
}

impl ResolvedIndicators {
    /// Outcome for an indicator.
    pub fn get(&self, indicator: &str) -> Option<&IndicatorValue> {
        self.values.get(indicator)
    }

    /// Amount for an indicator, if found.
    pub fn value(&self, indicator: &str) -> Option<i64> {
        self.get(indicator).and_then(IndicatorValue::value)
    }

    /// Iterates over `(indicator, outcome)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndicatorValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Only the indicators that were found.
    pub fn found(&self) -> BTreeMap<String, i64> {
        self.values
            .iter()
            .filter_map(|(name, value)| value.value().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Number of found indicators.
    pub fn found_count(&self) -> usize {
        self.values.values().filter(|v| v.is_found()).count()
    }

    /// Number of indicators resolved.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolves indicators with a fixed eligibility policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorResolver {
    classifier: ContextClassifier,
    policy: EligibilityPolicy,
}

impl IndicatorResolver {
    /// Creates a resolver using `policy` to accept contexts.
    pub const fn new(policy: EligibilityPolicy) -> Self {
        Self {
            classifier: ContextClassifier::new(),
            policy,
        }
    }

    /// Returns the eligibility policy.
    pub const fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Resolves every indicator in `aliases` against `index`.
    pub fn resolve(
        &self,
        index: &CodeIndex,
        aliases: &AliasTable,
        fiscal_year: i32,
    ) -> ResolvedIndicators {
        let values = aliases
            .iter()
            .map(|alias| {
                (
                    alias.name.clone(),
                    self.resolve_one(index, alias, fiscal_year),
                )
            })
            .collect();

        ResolvedIndicators {
            fiscal_year,
            values,
        }
    }

    fn resolve_one(
        &self,
        index: &CodeIndex,
        alias: &IndicatorAlias,
        fiscal_year: i32,
    ) -> IndicatorValue {
        let mut seen_code = false;
        let mut seen_blank = false;
        let mut selected: Option<&TagRecord> = None;

        for code in alias.codes() {
            let records = index.get(code);
            seen_code |= !records.is_empty();

            let eligible = records.iter().filter(|record| {
                self.policy
                    .is_eligible(&self.classifier.classify(&record.context_ref, fiscal_year))
            });
            for record in eligible {
                if record.is_blank() {
                    seen_blank = true;
                    continue;
                }
                if selected.is_none_or(|current| record.ordinal < current.ordinal) {
                    selected = Some(record);
                }
                break;
            }
        }

        let Some(record) = selected else {
            let absence = if seen_blank {
                Absence::BlankValue
            } else if seen_code {
                Absence::ContextIneligible
            } else {
                Absence::CodeAbsent
            };
            debug!(indicator = %alias.name, ?absence, "Indicator not found");
            return IndicatorValue::NotFound(absence);
        };

        match normalize_value(&record.raw_value, record.decimal_scale) {
            Ok(value) => {
                debug!(
                    indicator = %alias.name,
                    code = %record.code,
                    ordinal = record.ordinal,
                    value,
                    "Indicator resolved"
                );
                IndicatorValue::found(value)
            }
            Err(err) => {
                warn!(
                    indicator = %alias.name,
                    code = %record.code,
                    raw = %record.raw_value,
                    error = %err,
                    "Unparsable value on eligible tag"
                );
                IndicatorValue::NotFound(Absence::Unparsable {
                    code: record.code.clone(),
                    raw: record.raw_value.clone(),
                })
            }
        }
    }
}

/// Resolves with the default policy (duration and point-in-time contexts).
pub fn resolve(index: &CodeIndex, aliases: &AliasTable, fiscal_year: i32) -> ResolvedIndicators {
    IndicatorResolver::default().resolve(index, aliases, fiscal_year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, context: &str, value: &str, ordinal: usize) -> TagRecord {
        TagRecord {
            code: code.to_string(),
            context_ref: context.to_string(),
            decimal_scale: -6,
            raw_value: value.to_string(),
            ordinal,
        }
    }

    fn table() -> AliasTable {
        AliasTable::from_json_str(
            r#"{
                "equity": {"primary_code": "ifrs-full_Equity", "candidate_codes": ["dart_Equity"]},
                "cfo": {"primary_code": "ifrs-full_CashFlowsFromUsedInOperatingActivities"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_every_indicator_gets_an_outcome() {
        let resolved = resolve(&CodeIndex::new(), &table(), 2024);
        assert_eq!(resolved.len(), 2);
        assert_eq!(
            resolved.get("equity"),
            Some(&IndicatorValue::NotFound(Absence::CodeAbsent))
        );
        assert_eq!(resolved.found_count(), 0);
    }

    #[test]
    fn test_first_eligible_match_in_document_order_wins() {
        let index: CodeIndex = vec![
            record("ifrs-full_Equity", "PFY2023eFY", "1", 0),
            record("dart_Equity", "CFY2024eFY", "2", 1),
            record("ifrs-full_Equity", "CFY2024eFY", "3", 2),
        ]
        .into_iter()
        .collect();

        let resolved = resolve(&index, &table(), 2024);
        assert_eq!(resolved.value("equity"), Some(2_000_000));
    }

    #[test]
    fn test_absence_reasons_are_distinguished() {
        let index: CodeIndex = vec![
            record("ifrs-full_Equity", "CFY2024eFY", "-", 0),
            record("ifrs-full_CashFlowsFromUsedInOperatingActivities", "CFY2024dQ4", "5", 1),
        ]
        .into_iter()
        .collect();
        let resolved = resolve(&index, &table(), 2024);
        assert_eq!(
            resolved.get("equity"),
            Some(&IndicatorValue::NotFound(Absence::BlankValue))
        );
        assert_eq!(
            resolved.get("cfo"),
            Some(&IndicatorValue::NotFound(Absence::ContextIneligible))
        );

        let index: CodeIndex = vec![record("ifrs-full_Equity", "CFY2024eFY", "n/a", 0)]
            .into_iter()
            .collect();
        let resolved = resolve(&index, &table(), 2024);
        assert_eq!(
            resolved.get("equity"),
            Some(&IndicatorValue::NotFound(Absence::Unparsable {
                code: "ifrs-full_Equity".to_string(),
                raw: "n/a".to_string(),
            }))
        );
        assert_eq!(resolved.get("equity").map(IndicatorValue::or_zero), Some(0));
    }

    #[test]
    fn test_zero_is_a_real_value() {
        let index: CodeIndex = vec![record("ifrs-full_Equity", "CFY2024eFY", "0", 0)]
            .into_iter()
            .collect();
        let resolved = resolve(&index, &table(), 2024);
        assert_eq!(resolved.get("equity"), Some(&IndicatorValue::found(0)));
    }

    #[test]
    fn test_duration_only_policy_loses_balance_sheet() {
        let index: CodeIndex = vec![
            record("ifrs-full_Equity", "CFY2024eFY", "10", 0),
            record("ifrs-full_CashFlowsFromUsedInOperatingActivities", "CFY2024dFY", "5", 1),
        ]
        .into_iter()
        .collect();

        let resolver = IndicatorResolver::new(EligibilityPolicy::duration_only());
        let resolved = resolver.resolve(&index, &table(), 2024);
        assert_eq!(resolved.value("cfo"), Some(5_000_000));
        assert_eq!(resolved.value("equity"), None);

        let resolved = resolve(&index, &table(), 2024);
        assert_eq!(resolved.found().len(), 2);
    }

    #[test]
    fn test_serialized_outcomes_are_tagged() {
        let json = serde_json::to_string(&IndicatorValue::NotFound(Absence::CodeAbsent)).unwrap();
        assert_eq!(json, r#"{"status":"not_found","reason":"code_absent"}"#);
        let json = serde_json::to_string(&IndicatorValue::found(7)).unwrap();
        assert_eq!(json, r#"{"status":"found","value":7}"#);
    }
}
