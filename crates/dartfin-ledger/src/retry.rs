//! Store-backed reconciliation with optimistic retries.

use crate::error::{LedgerError, Result};
use crate::reconcile::changed_fields;
use crate::store::RecordStore;
use dartfin_indicators::ResolvedIndicators;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Result of writing one pass into a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Company identifier
    pub company_id: String,
    /// Fiscal year
    pub fiscal_year: i32,
    /// Record version after the pass
    pub version: u64,
    /// Fields written or changed
    pub written: usize,
    /// Found fields that already held the same value
    pub unchanged: usize,
    /// Not-found fields left as they were
    pub kept: usize,
    /// Read-modify-write attempts used
    pub attempts: u32,
}

impl ReconcileOutcome {
    /// Returns true if the pass changed nothing in the store.
    pub const fn is_noop(&self) -> bool {
        self.written == 0
    }
}

/// Applies resolved passes to a [`RecordStore`].
///
/// Each attempt reads the record with its version, computes the changed
/// fields and writes them conditionally. A conflicting concurrent write
/// restarts from a fresh read, up to `max_attempts` times. A pass that
/// changes nothing performs no write and leaves the version alone.
#[derive(Debug, Clone, Copy)]
pub struct StoreReconciler {
    max_attempts: u32,
}

impl Default for StoreReconciler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

impl StoreReconciler {
    /// Attempts made when none are configured.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates a reconciler; at least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Maximum read-modify-write attempts.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Merges `resolved` into the stored record for `company_id` and the
    /// pass's fiscal year.
    ///
    /// # Errors
    /// Returns [`LedgerError::RetriesExhausted`] if every attempt conflicted,
    /// or the store's error for anything else.
    #[instrument(skip(self, store, resolved), fields(fiscal_year = resolved.fiscal_year))]
    pub async fn reconcile(
        &self,
        store: &dyn RecordStore,
        company_id: &str,
        resolved: &ResolvedIndicators,
    ) -> Result<ReconcileOutcome> {
        let fiscal_year = resolved.fiscal_year;
        let found = resolved.found_count();
        let kept = resolved.len() - found;

        for attempt in 1..=self.max_attempts {
            let current = store.get_or_create(company_id, fiscal_year).await?;
            let changes = changed_fields(&current.record, resolved);

            let mut outcome = ReconcileOutcome {
                company_id: company_id.to_string(),
                fiscal_year,
                version: current.version,
                written: changes.len(),
                unchanged: found - changes.len(),
                kept,
                attempts: attempt,
            };

            if changes.is_empty() {
                debug!("Nothing to write");
                return Ok(outcome);
            }

            match store
                .upsert_fields(company_id, fiscal_year, &changes, current.version)
                .await
            {
                Ok(version) => {
                    outcome.version = version;
                    return Ok(outcome);
                }
                Err(e) if e.is_conflict() => {
                    warn!(attempt, error = %e, "Concurrent update, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::RetriesExhausted {
            company_id: company_id.to_string(),
            fiscal_year,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CompanyFinancialState;
    use crate::store::{InMemoryStore, VersionedRecord};
    use async_trait::async_trait;
    use dartfin_indicators::{Absence, IndicatorValue};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store that lets another writer slip in before the next few upserts.
    struct ContendedStore {
        inner: InMemoryStore,
        interruptions: AtomicU32,
    }

    impl ContendedStore {
        fn new(interruptions: u32) -> Self {
            Self {
                inner: InMemoryStore::new(),
                interruptions: AtomicU32::new(interruptions),
            }
        }
    }

    #[async_trait]
    impl RecordStore for ContendedStore {
        async fn get_or_create(&self, company_id: &str, fiscal_year: i32) -> Result<VersionedRecord> {
            self.inner.get_or_create(company_id, fiscal_year).await
        }

        async fn upsert_fields(
            &self,
            company_id: &str,
            fiscal_year: i32,
            fields: &BTreeMap<String, i64>,
            expected_version: u64,
        ) -> Result<u64> {
            let interrupt = self
                .interruptions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if interrupt {
                let current = self.inner.get_or_create(company_id, fiscal_year).await?;
                let other = BTreeMap::from([("cfo".to_string(), 99)]);
                self.inner
                    .upsert_fields(company_id, fiscal_year, &other, current.version)
                    .await?;
            }
            self.inner
                .upsert_fields(company_id, fiscal_year, fields, expected_version)
                .await
        }

        async fn load_company(&self, company_id: &str) -> Result<CompanyFinancialState> {
            self.inner.load_company(company_id).await
        }

        async fn companies(&self) -> Result<Vec<String>> {
            self.inner.companies().await
        }
    }

    fn pass(values: &[(&str, Option<i64>)]) -> ResolvedIndicators {
        ResolvedIndicators {
            fiscal_year: 2024,
            values: values
                .iter()
                .map(|(name, value)| {
                    let outcome = value.map_or(
                        IndicatorValue::NotFound(Absence::CodeAbsent),
                        IndicatorValue::found,
                    );
                    ((*name).to_string(), outcome)
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_repeated_pass_is_noop() {
        let store = InMemoryStore::new();
        let reconciler = StoreReconciler::default();
        let resolved = pass(&[("equity", Some(10)), ("bonds", None)]);

        let first = reconciler.reconcile(&store, "00126380", &resolved).await.unwrap();
        let second = reconciler.reconcile(&store, "00126380", &resolved).await.unwrap();

        assert_eq!(first.written, 1);
        assert_eq!(first.kept, 1);
        assert_eq!(first.version, 1);
        assert!(second.is_noop());
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.version, 1);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_from_fresh_read() {
        let store = ContendedStore::new(1);
        let reconciler = StoreReconciler::new(3);

        let outcome = reconciler
            .reconcile(&store, "00126380", &pass(&[("equity", Some(10))]))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        let stored = store.get_or_create("00126380", 2024).await.unwrap();
        assert_eq!(stored.record.get("equity"), Some(10));
        assert_eq!(stored.record.get("cfo"), Some(99));
        assert_eq!(stored.version, outcome.version);
    }

    #[tokio::test]
    async fn test_persistent_conflict_gives_up() {
        let store = ContendedStore::new(u32::MAX);
        let reconciler = StoreReconciler::new(3);

        let err = reconciler
            .reconcile(&store, "00126380", &pass(&[("equity", Some(10))]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(StoreReconciler::new(0).max_attempts(), 1);
    }
}
