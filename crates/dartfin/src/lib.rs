#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/dartfin/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod locks;
pub mod pipeline;
pub mod report;

// Re-export sub-crates
pub use dartfin_indicators as indicators;
pub use dartfin_ledger as ledger;
pub use dartfin_xbrl as xbrl;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use fetcher::{DirectoryFetcher, DocumentFetcher, MemoryFetcher};
pub use locator::{
    AnnualFilingWindow, FilingDownloader, FilingEntry, FilingPage, LocatedFetcher, ReportLocator,
    is_annual_report_name,
};
pub use locks::KeyedLocks;
pub use pipeline::{Pipeline, UnitResult};
pub use report::{ExtractionReport, UnitOutcome};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
