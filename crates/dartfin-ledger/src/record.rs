//! Yearly records and per-company state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last known indicator values for one company and fiscal year.
///
/// A field is populated exactly when it has an entry in `fields`; absent
/// fields have none. Values are in won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyFinancialRecord {
    /// DART corporation code
    pub company_id: String,
    /// Fiscal year
    pub fiscal_year: i32,
    /// Indicator name to value, populated fields only
    pub fields: BTreeMap<String, i64>,
}

impl YearlyFinancialRecord {
    /// Creates a record with every field absent.
    pub fn new(company_id: impl Into<String>, fiscal_year: i32) -> Self {
        Self {
            company_id: company_id.into(),
            fiscal_year,
            fields: BTreeMap::new(),
        }
    }

    /// Value of a field, if populated.
    pub fn get(&self, indicator: &str) -> Option<i64> {
        self.fields.get(indicator).copied()
    }

    /// Returns true if the field holds a value.
    pub fn is_populated(&self, indicator: &str) -> bool {
        self.fields.contains_key(indicator)
    }

    /// Number of populated fields.
    pub fn populated_count(&self) -> usize {
        self.fields.len()
    }

    /// Writes a field, returning the previous value.
    pub fn set(&mut self, indicator: impl Into<String>, value: i64) -> Option<i64> {
        self.fields.insert(indicator.into(), value)
    }
}

/// All yearly records of one company, at most one per fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyFinancialState {
    /// DART corporation code
    pub company_id: String,
    /// Fiscal year to record
    pub records: BTreeMap<i32, YearlyFinancialRecord>,
}

impl CompanyFinancialState {
    /// Creates an empty state.
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            records: BTreeMap::new(),
        }
    }

    /// Record for a fiscal year, if one exists.
    pub fn record(&self, fiscal_year: i32) -> Option<&YearlyFinancialRecord> {
        self.records.get(&fiscal_year)
    }

    /// Record for a fiscal year, created empty when missing.
    pub fn get_or_create(&mut self, fiscal_year: i32) -> &mut YearlyFinancialRecord {
        let company_id = &self.company_id;
        self.records
            .entry(fiscal_year)
            .or_insert_with(|| YearlyFinancialRecord::new(company_id.clone(), fiscal_year))
    }

    /// Adds or replaces a record, keyed by its fiscal year.
    pub fn insert(&mut self, record: YearlyFinancialRecord) {
        self.records.insert(record.fiscal_year, record);
    }

    /// Fiscal years with a record, ascending.
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.records.keys().copied()
    }

    /// Records in fiscal year order.
    pub fn iter(&self) -> impl Iterator<Item = &YearlyFinancialRecord> {
        self.records.values()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record exists.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
