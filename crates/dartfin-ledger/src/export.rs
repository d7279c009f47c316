//! CSV, JSON and DataFrame export of yearly records.
//!
//! CSV output is long-form: one row per populated field, with columns
//! `company_id`, `fiscal_year`, `indicator` and `value`. Absent fields
//! produce no row. The DataFrame form is wide, one nullable column per
//! indicator.

use crate::record::{CompanyFinancialState, YearlyFinancialRecord};
use polars::prelude::{Column, DataFrame, PolarsError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer produced bytes that are not UTF-8.
    #[error("Encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// DataFrame construction error.
    #[error("DataFrame error: {0}")]
    Polars(#[from] PolarsError),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One populated field as a CSV row.
#[derive(Debug, Serialize)]
struct FieldRow<'a> {
    company_id: &'a str,
    fiscal_year: i32,
    indicator: &'a str,
    value: i64,
}

fn field_rows(record: &YearlyFinancialRecord) -> impl Iterator<Item = FieldRow<'_>> {
    record.fields.iter().map(|(indicator, value)| FieldRow {
        company_id: &record.company_id,
        fiscal_year: record.fiscal_year,
        indicator,
        value: *value,
    })
}

fn rows_to_csv<'a>(
    records: impl IntoIterator<Item = &'a YearlyFinancialRecord>,
) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        for row in field_rows(record) {
            wtr.serialize(row)?;
        }
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl Exporter for YearlyFinancialRecord {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv([self]),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for Vec<YearlyFinancialRecord> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv(self),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for CompanyFinancialState {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => rows_to_csv(self.iter()),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Builds a wide DataFrame with `company_id`, `fiscal_year` and one
/// nullable Int64 column per indicator seen in any record.
///
/// # Errors
///
/// Returns an error if the DataFrame cannot be assembled.
pub fn to_dataframe(records: &[YearlyFinancialRecord]) -> Result<DataFrame, ExportError> {
    let indicators: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.fields.keys().map(String::as_str))
        .collect();

    let company_ids: Vec<&str> = records.iter().map(|r| r.company_id.as_str()).collect();
    let years: Vec<i32> = records.iter().map(|r| r.fiscal_year).collect();

    let mut columns = Vec::with_capacity(indicators.len() + 2);
    columns.push(Column::new("company_id".into(), company_ids));
    columns.push(Column::new("fiscal_year".into(), years));
    for indicator in indicators {
        let values: Vec<Option<i64>> = records.iter().map(|r| r.get(indicator)).collect();
        columns.push(Column::new(indicator.into(), values));
    }

    Ok(DataFrame::new(columns)?)
}
