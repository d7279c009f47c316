//! Persistence boundary for yearly records.
//!
//! Stores version every record. A writer reads a record with its version,
//! computes the fields to change, and passes the version back to
//! [`RecordStore::upsert_fields`]; a concurrent write in between yields
//! [`LedgerError::Conflict`](crate::LedgerError::Conflict) and the caller
//! retries from a fresh read.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::record::{CompanyFinancialState, YearlyFinancialRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    /// Record contents
    pub record: YearlyFinancialRecord,
    /// Store version; 0 for a freshly created record
    pub version: u64,
}

/// Store for yearly financial records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the record for (company, year), creating an empty one first if needed.
    async fn get_or_create(&self, company_id: &str, fiscal_year: i32) -> Result<VersionedRecord>;

    /// Writes `fields` into an existing record if it is still at
    /// `expected_version`, returning the new version.
    ///
    /// Fields not named in `fields` are left untouched.
    async fn upsert_fields(
        &self,
        company_id: &str,
        fiscal_year: i32,
        fields: &BTreeMap<String, i64>,
        expected_version: u64,
    ) -> Result<u64>;

    /// Loads every record of a company.
    async fn load_company(&self, company_id: &str) -> Result<CompanyFinancialState>;

    /// Companies with at least one record, sorted.
    async fn companies(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every store must share.

    use super::*;
    use crate::error::LedgerError;

    pub(crate) async fn get_or_create_is_idempotent(store: &dyn RecordStore) {
        let first = store.get_or_create("00126380", 2024).await.unwrap();
        let second = store.get_or_create("00126380", 2024).await.unwrap();

        assert_eq!(first.version, 0);
        assert_eq!(first, second);
        assert!(first.record.fields.is_empty());
    }

    pub(crate) async fn upsert_merges_and_bumps_version(store: &dyn RecordStore) {
        let current = store.get_or_create("00126380", 2024).await.unwrap();
        let v1 = store
            .upsert_fields(
                "00126380",
                2024,
                &BTreeMap::from([("equity".to_string(), 10), ("cfo".to_string(), 5)]),
                current.version,
            )
            .await
            .unwrap();
        let v2 = store
            .upsert_fields(
                "00126380",
                2024,
                &BTreeMap::from([("equity".to_string(), 11)]),
                v1,
            )
            .await
            .unwrap();

        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        let stored = store.get_or_create("00126380", 2024).await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.record.get("equity"), Some(11));
        assert_eq!(stored.record.get("cfo"), Some(5));
    }

    pub(crate) async fn stale_version_conflicts(store: &dyn RecordStore) {
        let current = store.get_or_create("00126380", 2024).await.unwrap();
        let fields = BTreeMap::from([("equity".to_string(), 10)]);
        store
            .upsert_fields("00126380", 2024, &fields, current.version)
            .await
            .unwrap();

        let err = store
            .upsert_fields("00126380", 2024, &fields, current.version)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Conflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    pub(crate) async fn upsert_requires_existing_record(store: &dyn RecordStore) {
        let err = store
            .upsert_fields(
                "00126380",
                2030,
                &BTreeMap::from([("equity".to_string(), 1)]),
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MissingRecord { .. }));
    }

    pub(crate) async fn load_company_groups_years(store: &dyn RecordStore) {
        for year in [2022, 2024, 2023] {
            let current = store.get_or_create("00126380", year).await.unwrap();
            store
                .upsert_fields(
                    "00126380",
                    year,
                    &BTreeMap::from([("equity".to_string(), i64::from(year))]),
                    current.version,
                )
                .await
                .unwrap();
        }
        store.get_or_create("00164779", 2024).await.unwrap();

        let state = store.load_company("00126380").await.unwrap();
        assert_eq!(state.years().collect::<Vec<_>>(), [2022, 2023, 2024]);
        assert_eq!(state.record(2023).unwrap().get("equity"), Some(2023));
        assert_eq!(
            store.companies().await.unwrap(),
            ["00126380".to_string(), "00164779".to_string()]
        );
        assert!(store.load_company("99999999").await.unwrap().is_empty());
    }
}
