#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/dartfin/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod export;
pub mod reconcile;
pub mod record;
pub mod retry;
pub mod store;

pub use error::{LedgerError, Result};
pub use export::{ExportError, ExportFormat, Exporter, to_dataframe};
pub use reconcile::{ApplySummary, apply, changed_fields, reconcile};
pub use record::{CompanyFinancialState, YearlyFinancialRecord};
pub use retry::{ReconcileOutcome, StoreReconciler};
pub use store::{InMemoryStore, RecordStore, SqliteStore, VersionedRecord};
