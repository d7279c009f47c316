//! Record store location.
//!
//! Opens the SQLite record store, defaulting to a platform-specific data
//! directory.

use dartfin::ledger::{LedgerError, RecordStore, SqliteStore};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors opening the record store.
#[derive(Debug, Error)]
pub(crate) enum StoreOpenError {
    /// Store directory could not be created.
    #[error("Cannot create {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Database could not be opened.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Get the default data directory path.
///
/// Uses platform-specific data directories:
/// - Linux: `~/.local/share/dartfin/`
/// - macOS: `~/Library/Application Support/dartfin/`
/// - Windows: `%APPDATA%\dartfin\`
pub(crate) fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dartfin")
}

/// Get the default store database path.
pub(crate) fn default_store_path() -> PathBuf {
    default_data_dir().join("dartfin.db")
}

/// Resolve the store path from an optional override.
pub(crate) fn store_path(path: Option<&Path>) -> PathBuf {
    path.map_or_else(default_store_path, Path::to_path_buf)
}

/// Open the store, creating the directory if needed.
pub(crate) fn open_store(path: &Path) -> Result<SqliteStore, StoreOpenError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| StoreOpenError::Directory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    Ok(SqliteStore::new(path)?)
}

/// Print store location info.
pub(crate) async fn print_store_info(store: &dyn RecordStore, path: &Path) {
    println!("  Store location: {}", path.display());
    if let Ok(companies) = store.companies().await {
        println!("  Stored companies: {}", companies.len());
    }
}
