//! Pipeline configuration.

use crate::error::{PipelineError, Result};
use dartfin_indicators::AliasTable;
use dartfin_ledger::StoreReconciler;
use dartfin_xbrl::{EligibilityPolicy, ParserConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings for a [`Pipeline`](crate::Pipeline).
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```json
/// { "eligibility": { "point_in_time": false }, "concurrency": 8 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parser fallback settings
    pub parser: ParserConfig,

    /// Which contexts may feed resolution
    pub eligibility: EligibilityPolicy,

    /// Read-modify-write attempts per reconciliation
    pub reconcile_attempts: u32,

    /// Units processed at once by `run_many`
    pub concurrency: usize,

    /// Custom alias table; the built-in table is used when unset
    pub alias_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            eligibility: EligibilityPolicy::default(),
            reconcile_attempts: StoreReconciler::DEFAULT_MAX_ATTEMPTS,
            concurrency: 4,
            alias_path: None,
        }
    }
}

impl PipelineConfig {
    /// Decodes a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Loads the configured alias table, or the built-in one.
    ///
    /// # Errors
    /// A malformed table is fatal; callers should stop before processing
    /// any document.
    pub fn load_aliases(&self) -> Result<Arc<AliasTable>> {
        let table = match &self.alias_path {
            Some(path) => AliasTable::from_path(path)?,
            None => AliasTable::builtin()?,
        };
        Ok(Arc::new(table))
    }

    /// Reconciler honouring `reconcile_attempts`.
    pub fn reconciler(&self) -> StoreReconciler {
        StoreReconciler::new(self.reconcile_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{"eligibility": {"point_in_time": false}}"#).unwrap();

        assert!(config.eligibility.duration);
        assert!(!config.eligibility.point_in_time);
        assert_eq!(config.parser, ParserConfig::default());
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.reconciler().max_attempts(), StoreReconciler::DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_default_loads_builtin_aliases() {
        let aliases = PipelineConfig::default().load_aliases().unwrap();
        assert!(aliases.get("equity").is_some());
    }

    #[test]
    fn test_missing_alias_file_is_fatal() {
        let config = PipelineConfig {
            alias_path: Some(PathBuf::from("/nonexistent/aliases.json")),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.load_aliases(),
            Err(PipelineError::Alias(_))
        ));
    }

    #[test]
    fn test_unknown_json_is_rejected() {
        assert!(PipelineConfig::from_json_str("[1, 2]").is_err());
    }
}
