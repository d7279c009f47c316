//! Error types for alias loading and value normalization.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for alias table operations.
pub type Result<T> = std::result::Result<T, AliasError>;

/// Errors raised while loading an alias table.
///
/// All of these are fatal at startup: a partial table would silently drop
/// indicators from every document.
#[derive(Debug, Error)]
pub enum AliasError {
    /// Table file could not be read
    #[error("Failed to read alias table {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Table is not valid JSON or has the wrong shape
    #[error("Invalid alias table: {0}")]
    Json(#[from] serde_json::Error),

    /// Table has no entries
    #[error("Alias table is empty")]
    Empty,

    /// Indicator name is blank
    #[error("Alias entry with a blank indicator name")]
    BlankIndicator,

    /// Primary code is blank
    #[error("Indicator {indicator} has a blank primary code")]
    BlankPrimaryCode {
        /// Indicator name
        indicator: String,
    },

    /// A candidate code is blank
    #[error("Indicator {indicator} has a blank candidate code")]
    BlankCandidateCode {
        /// Indicator name
        indicator: String,
    },

    /// Indicator is not in the table
    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),
}

/// Reasons a displayed value cannot be read as a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Nothing but whitespace or a dash
    #[error("Value is blank")]
    Blank,

    /// Characters that are not part of a number
    #[error("Not a number: {0:?}")]
    Invalid(String),

    /// Scaled value does not fit in 64 bits
    #[error("Value out of range: {0:?}")]
    Overflow(String),
}
