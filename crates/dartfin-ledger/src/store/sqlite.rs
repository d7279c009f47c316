//! SQLite record store.

use super::{RecordStore, VersionedRecord};
use crate::error::{LedgerError, Result};
use crate::record::{CompanyFinancialState, YearlyFinancialRecord};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

/// Record store backed by a SQLite database file.
///
/// Fields live in their own table, one row per populated indicator, so a
/// write only ever adds or replaces rows and never clears one.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::Lock(e.to_string()))
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS yearly_records (
                company_id TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (company_id, fiscal_year)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS yearly_fields (
                company_id TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                indicator TEXT NOT NULL,
                value INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (company_id, fiscal_year, indicator)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_yearly_fields_company
             ON yearly_fields(company_id, fiscal_year)",
            [],
        )?;

        debug!("SQLite record store schema initialized");
        Ok(())
    }
}

/// Reads the stored version of a record, if the record exists.
fn stored_version(conn: &Connection, company_id: &str, fiscal_year: i32) -> Result<Option<u64>> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM yearly_records WHERE company_id = ?1 AND fiscal_year = ?2",
            params![company_id, fiscal_year],
            |row| row.get(0),
        )
        .optional()?;
    version
        .map(|v| u64::try_from(v).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, v)))
        .transpose()
        .map_err(LedgerError::from)
}

fn read_fields(
    conn: &Connection,
    company_id: &str,
    fiscal_year: i32,
) -> Result<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT indicator, value FROM yearly_fields
         WHERE company_id = ?1 AND fiscal_year = ?2",
    )?;
    let rows = stmt.query_map(params![company_id, fiscal_year], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut fields = BTreeMap::new();
    for row in rows {
        let (indicator, value) = row?;
        fields.insert(indicator, value);
    }
    Ok(fields)
}

#[async_trait]
impl RecordStore for SqliteStore {
    #[instrument(skip(self))]
    async fn get_or_create(&self, company_id: &str, fiscal_year: i32) -> Result<VersionedRecord> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let created = conn.execute(
            "INSERT OR IGNORE INTO yearly_records
             (company_id, fiscal_year, version, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)",
            params![company_id, fiscal_year, now],
        )?;
        if created > 0 {
            debug!("Creating empty record");
        }

        let version = stored_version(&conn, company_id, fiscal_year)?.ok_or_else(|| {
            LedgerError::MissingRecord {
                company_id: company_id.to_string(),
                fiscal_year,
            }
        })?;
        let fields = read_fields(&conn, company_id, fiscal_year)?;

        Ok(VersionedRecord {
            record: YearlyFinancialRecord {
                company_id: company_id.to_string(),
                fiscal_year,
                fields,
            },
            version,
        })
    }

    #[instrument(skip(self, fields), fields(field_count = fields.len()))]
    async fn upsert_fields(
        &self,
        company_id: &str,
        fiscal_year: i32,
        fields: &BTreeMap<String, i64>,
        expected_version: u64,
    ) -> Result<u64> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let actual = stored_version(&tx, company_id, fiscal_year)?.ok_or_else(|| {
            LedgerError::MissingRecord {
                company_id: company_id.to_string(),
                fiscal_year,
            }
        })?;
        if actual != expected_version {
            return Err(LedgerError::Conflict {
                company_id: company_id.to_string(),
                fiscal_year,
                expected: expected_version,
                actual,
            });
        }

        let now = Utc::now().to_rfc3339();
        for (indicator, value) in fields {
            tx.execute(
                "INSERT OR REPLACE INTO yearly_fields
                 (company_id, fiscal_year, indicator, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![company_id, fiscal_year, indicator, value, now],
            )?;
        }

        let version = actual + 1;
        tx.execute(
            "UPDATE yearly_records SET version = version + 1, updated_at = ?3
             WHERE company_id = ?1 AND fiscal_year = ?2",
            params![company_id, fiscal_year, now],
        )?;
        tx.commit()?;

        debug!(version, "Record updated");
        Ok(version)
    }

    async fn load_company(&self, company_id: &str) -> Result<CompanyFinancialState> {
        let conn = self.lock()?;
        let mut state = CompanyFinancialState::new(company_id);

        let mut stmt = conn.prepare(
            "SELECT fiscal_year FROM yearly_records WHERE company_id = ?1 ORDER BY fiscal_year",
        )?;
        let years = stmt.query_map(params![company_id], |row| row.get::<_, i32>(0))?;
        for year in years {
            let year = year?;
            state.insert(YearlyFinancialRecord {
                company_id: company_id.to_string(),
                fiscal_year: year,
                fields: read_fields(&conn, company_id, year)?,
            });
        }

        Ok(state)
    }

    async fn companies(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT company_id FROM yearly_records ORDER BY company_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut companies = Vec::new();
        for row in rows {
            companies.push(row?);
        }
        Ok(companies)
    }
}
