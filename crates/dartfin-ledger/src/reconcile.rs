//! Monotonic merge of resolved indicators into yearly records.
//!
//! A found value always overwrites: the latest pass is authoritative for the
//! fields it resolved. A not-found outcome never touches the stored field, so
//! a pass that misses a field cannot erase it.

use crate::error::{LedgerError, Result};
use crate::record::{CompanyFinancialState, YearlyFinancialRecord};
use dartfin_indicators::ResolvedIndicators;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one pass did to a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    /// Fields whose value was written or changed
    pub written: usize,
    /// Found fields that already held the same value
    pub unchanged: usize,
    /// Not-found fields left as they were
    pub kept: usize,
}

/// Found values that differ from what `record` holds.
pub fn changed_fields(
    record: &YearlyFinancialRecord,
    resolved: &ResolvedIndicators,
) -> BTreeMap<String, i64> {
    resolved
        .found()
        .into_iter()
        .filter(|(indicator, value)| record.get(indicator) != Some(*value))
        .collect()
}

/// Merges `resolved` into an existing record.
pub fn apply(record: &mut YearlyFinancialRecord, resolved: &ResolvedIndicators) -> ApplySummary {
    let mut summary = ApplySummary::default();
    for (indicator, outcome) in resolved.iter() {
        match outcome.value() {
            Some(value) => {
                if record.set(indicator, value) == Some(value) {
                    summary.unchanged += 1;
                } else {
                    summary.written += 1;
                }
            }
            None => summary.kept += 1,
        }
    }
    summary
}

/// Merges one pass into a company's state and returns the updated state.
///
/// The record for `fiscal_year` is created empty first when it does not
/// exist yet.
pub fn reconcile(
    company_id: &str,
    fiscal_year: i32,
    resolved: &ResolvedIndicators,
    mut state: CompanyFinancialState,
) -> Result<CompanyFinancialState> {
    if state.company_id != company_id {
        return Err(LedgerError::CompanyMismatch {
            expected: company_id.to_string(),
            actual: state.company_id,
        });
    }
    let record = state.get_or_create(fiscal_year);
    apply(record, resolved);
    Ok(state)
}
