//! Integration module for the CLI.
//!
//! This module opens the record store at its platform default location and
//! drives batch runs with progress reporting.

pub(crate) mod batch;
pub(crate) mod store_manager;
