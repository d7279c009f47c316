//! Per-unit extraction reports.

use dartfin_indicators::{IndicatorValue, ResolvedIndicators};
use dartfin_ledger::ReconcileOutcome;
use dartfin_xbrl::{FilterStats, ParseStats, ParseTier, TierFailure};
use serde::{Deserialize, Serialize};

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Company identifier
    pub company_id: String,
    /// Target fiscal year
    pub fiscal_year: i32,
    /// Parse strategy that produced the index
    pub tier: ParseTier,
    /// Strategies that gave up before `tier`
    pub tier_failures: Vec<TierFailure>,
    /// Tag counters before the context filter
    pub parse: ParseStats,
    /// Counters of the context filter
    pub filter: FilterStats,
    /// Outcome of every indicator
    pub indicators: ResolvedIndicators,
    /// Store write, when the pass was persisted
    pub reconcile: Option<ReconcileOutcome>,
}

impl ExtractionReport {
    /// Indicators that resolved to a value.
    pub fn found_count(&self) -> usize {
        self.indicators.found_count()
    }

    /// Indicators without a value.
    pub fn missing_count(&self) -> usize {
        self.indicators.len() - self.found_count()
    }

    /// Outcome for one indicator.
    pub fn outcome(&self, indicator: &str) -> Option<&IndicatorValue> {
        self.indicators.get(indicator)
    }

    /// Returns true if every parse strategy failed.
    pub fn is_unparsed(&self) -> bool {
        self.tier == ParseTier::Unparsed
    }
}

/// Result of one (company, fiscal year) unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// A document was found and processed
    Extracted(Box<ExtractionReport>),
    /// The fetcher had no document; nothing was written
    DocumentNotFound {
        /// Company identifier
        company_id: String,
        /// Target fiscal year
        fiscal_year: i32,
    },
}

impl UnitOutcome {
    /// The report, if a document was processed.
    pub fn report(&self) -> Option<&ExtractionReport> {
        match self {
            Self::Extracted(report) => Some(report),
            Self::DocumentNotFound { .. } => None,
        }
    }

    /// Company and fiscal year of the unit.
    pub fn key(&self) -> (&str, i32) {
        match self {
            Self::Extracted(report) => (&report.company_id, report.fiscal_year),
            Self::DocumentNotFound {
                company_id,
                fiscal_year,
            } => (company_id, *fiscal_year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dartfin_indicators::Absence;
    use std::collections::BTreeMap;

    fn report() -> ExtractionReport {
        ExtractionReport {
            company_id: "00126380".to_string(),
            fiscal_year: 2024,
            tier: ParseTier::Pattern,
            tier_failures: vec![TierFailure {
                tier: ParseTier::Strict,
                reason: "unexpected end".to_string(),
            }],
            parse: ParseStats {
                total_tags: 10,
                coded_tags: 8,
            },
            filter: FilterStats {
                eligible_tags: 4,
                rejected_tags: 4,
                blank_values: 1,
                code_index_size: 3,
            },
            indicators: ResolvedIndicators {
                fiscal_year: 2024,
                values: BTreeMap::from([
                    ("equity".to_string(), IndicatorValue::found(100)),
                    (
                        "bonds".to_string(),
                        IndicatorValue::NotFound(Absence::CodeAbsent),
                    ),
                ]),
            },
            reconcile: None,
        }
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.found_count(), 1);
        assert_eq!(report.missing_count(), 1);
        assert!(!report.is_unparsed());
        assert_eq!(report.outcome("equity").and_then(IndicatorValue::value), Some(100));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = UnitOutcome::Extracted(Box::new(report()));
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "extracted");
        assert_eq!(json["tier"], "pattern");
        assert_eq!(json["indicators"]["values"]["bonds"]["reason"], "code_absent");

        let back: UnitOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);

        let missing = UnitOutcome::DocumentNotFound {
            company_id: "00126380".to_string(),
            fiscal_year: 2023,
        };
        assert_eq!(missing.key(), ("00126380", 2023));
        assert!(missing.report().is_none());
    }
}
