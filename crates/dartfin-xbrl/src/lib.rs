#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/dartfin/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod code;
pub mod context;
pub mod document;
pub mod error;
pub mod parser;

pub use code::{CodeIndex, FilterStats, TagRecord, normalize_code};
pub use context::{
    ContextClassifier, ContextKind, EligibilityPolicy, PeriodKind, PeriodRelation, StatementScope,
};
pub use document::{RawDocument, select_annual_report};
pub use error::{Result, XbrlError};
pub use parser::{
    ParseStats, ParseTier, ParsedDocument, ParserConfig, StructuralParser, TierFailure,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
