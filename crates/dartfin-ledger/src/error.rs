//! Error types for record storage and reconciliation.

use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by record stores and the reconciler.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Record changed since it was read; retry the read-modify-write
    #[error("Version conflict for {company_id}/{fiscal_year}: expected {expected}, found {actual}")]
    Conflict {
        /// Company identifier
        company_id: String,
        /// Fiscal year
        fiscal_year: i32,
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Write attempted before the record was created
    #[error("No record for {company_id}/{fiscal_year}")]
    MissingRecord {
        /// Company identifier
        company_id: String,
        /// Fiscal year
        fiscal_year: i32,
    },

    /// State belongs to another company
    #[error("State belongs to company {actual}, not {expected}")]
    CompanyMismatch {
        /// Company the caller asked for
        expected: String,
        /// Company owning the state
        actual: String,
    },

    /// Conflicts persisted through every attempt
    #[error("Gave up on {company_id}/{fiscal_year} after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Company identifier
        company_id: String,
        /// Fiscal year
        fiscal_year: i32,
        /// Attempts made
        attempts: u32,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection lock poisoned
    #[error("Store lock poisoned: {0}")]
    Lock(String),
}

impl LedgerError {
    /// Returns true for errors that a fresh read-modify-write may resolve.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
