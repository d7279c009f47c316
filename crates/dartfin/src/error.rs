//! Pipeline errors.

use dartfin_indicators::AliasError;
use dartfin_ledger::LedgerError;
use dartfin_xbrl::XbrlError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a unit of work or pipeline setup.
///
/// Parse failures and missing indicators are not errors; they show up in the
/// [`ExtractionReport`](crate::ExtractionReport).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Alias table could not be loaded
    #[error("Alias table error: {0}")]
    Alias(#[from] AliasError),

    /// Record store or reconciliation failure
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Document handling failure outside the parser fallback
    #[error("Document error: {0}")]
    Xbrl(#[from] XbrlError),

    /// Filesystem error
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Configuration file could not be decoded
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Filing lookup or download failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Blocking extraction task panicked or was cancelled
    #[error("Extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
