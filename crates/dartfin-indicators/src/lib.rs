#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/dartfin/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod alias;
pub mod error;
pub mod resolver;
pub mod value;

pub use alias::{AliasTable, IndicatorAlias};
pub use error::{AliasError, Result, ValueError};
pub use resolver::{Absence, IndicatorResolver, IndicatorValue, ResolvedIndicators, resolve};
pub use value::normalize_value;
