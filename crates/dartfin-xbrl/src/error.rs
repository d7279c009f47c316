//! Error types for document parsing.
//!
//! Parsing itself never fails the caller: these errors describe why a single
//! parse tier gave up, and are recorded before the next tier is tried.

use thiserror::Error;

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, XbrlError>;

/// Errors raised while reading a filing document.
#[derive(Debug, Error)]
pub enum XbrlError {
    /// The document bytes are not valid UTF-8
    #[error("Invalid UTF-8 at byte {valid_up_to}")]
    InvalidUtf8 {
        /// Length of the valid prefix
        valid_up_to: usize,
    },

    /// The markup is not well formed
    #[error("Malformed markup at byte {position}: {message}")]
    Malformed {
        /// Byte offset reported by the reader
        position: u64,
        /// Reader error message
        message: String,
    },

    /// The document ended while elements were still open
    #[error("Document truncated with {open_elements} open element(s)")]
    Truncated {
        /// Number of unclosed elements at end of input
        open_elements: usize,
    },

    /// The tolerant reader hit more recoverable errors than allowed
    #[error("Gave up after {errors} recoverable markup errors")]
    ErrorBudgetExhausted {
        /// Number of errors seen
        errors: usize,
    },

    /// The tolerant reader stopped advancing after an error
    #[error("Reader made no progress past byte {position}")]
    NoProgress {
        /// Byte offset where the reader stalled
        position: u64,
    },

    /// The tolerant reader saw fewer `TE` elements than the text contains
    #[error("Reader recovered {seen} of {expected} TE element(s)")]
    MissedTags {
        /// Elements the reader produced
        seen: usize,
        /// `<TE` openings found by text search
        expected: usize,
    },

    /// The pattern scanner could not be built
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// No archive member looked like an annual report
    #[error("No annual report document among {members} member(s)")]
    AnnualReportNotFound {
        /// Number of members inspected
        members: usize,
    },
}
