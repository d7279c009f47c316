//! In-memory record store.

use super::{RecordStore, VersionedRecord};
use crate::error::{LedgerError, Result};
use crate::record::{CompanyFinancialState, YearlyFinancialRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Record store held in a `RwLock`-protected map.
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<(String, i32), VersionedRecord>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    #[instrument(skip(self))]
    async fn get_or_create(&self, company_id: &str, fiscal_year: i32) -> Result<VersionedRecord> {
        let key = (company_id.to_string(), fiscal_year);
        if let Some(existing) = self.records.read().await.get(&key) {
            return Ok(existing.clone());
        }

        let mut records = self.records.write().await;
        let entry = records.entry(key).or_insert_with(|| {
            debug!("Creating empty record");
            VersionedRecord {
                record: YearlyFinancialRecord::new(company_id, fiscal_year),
                version: 0,
            }
        });
        Ok(entry.clone())
    }

    #[instrument(skip(self, fields), fields(field_count = fields.len()))]
    async fn upsert_fields(
        &self,
        company_id: &str,
        fiscal_year: i32,
        fields: &BTreeMap<String, i64>,
        expected_version: u64,
    ) -> Result<u64> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&(company_id.to_string(), fiscal_year))
            .ok_or_else(|| LedgerError::MissingRecord {
                company_id: company_id.to_string(),
                fiscal_year,
            })?;

        if stored.version != expected_version {
            return Err(LedgerError::Conflict {
                company_id: company_id.to_string(),
                fiscal_year,
                expected: expected_version,
                actual: stored.version,
            });
        }

        for (indicator, value) in fields {
            stored.record.set(indicator.clone(), *value);
        }
        stored.version += 1;
        debug!(version = stored.version, "Record updated");
        Ok(stored.version)
    }

    async fn load_company(&self, company_id: &str) -> Result<CompanyFinancialState> {
        let records = self.records.read().await;
        let mut state = CompanyFinancialState::new(company_id);
        for ((company, _), stored) in records.iter() {
            if company == company_id {
                state.insert(stored.record.clone());
            }
        }
        Ok(state)
    }

    async fn companies(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let companies: BTreeSet<_> = records.keys().map(|(company, _)| company.clone()).collect();
        Ok(companies.into_iter().collect())
    }
}
