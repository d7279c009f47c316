//! Document sources.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use dartfin_xbrl::{RawDocument, XbrlError, select_annual_report};
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Yields the annual report body for a company and fiscal year.
///
/// `Ok(None)` means no filing exists; it is an expected outcome, not an
/// error.
#[async_trait]
pub trait DocumentFetcher: Send + Sync + Debug {
    /// Fetches the filing for `company_id` and `fiscal_year`.
    async fn fetch(&self, company_id: &str, fiscal_year: i32) -> Result<Option<RawDocument>>;
}

/// Reads filings from a local directory tree.
///
/// Two layouts are understood, checked in this order:
///
/// - `<root>/<company>/<year>.xml`: the body itself;
/// - `<root>/<company>/<year>/`: the extracted members of a filing archive,
///   from which the annual report body is selected.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    /// Creates a fetcher rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Company directories under the root, sorted.
    pub async fn companies(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| PipelineError::io(&self.root, e))?;

        let mut companies = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| PipelineError::io(entry.path(), e))?
                .is_dir();
            if is_dir && let Some(name) = entry.file_name().to_str() {
                companies.push(name.to_string());
            }
        }
        companies.sort();
        Ok(companies)
    }

    async fn read_members(&self, dir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| PipelineError::io(dir, e))?;

        let mut members = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(dir, e))?
        {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            if !name.to_ascii_lowercase().ends_with(".xml") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| PipelineError::io(&path, e))?;
            members.push((name, bytes));
        }
        // Archive order is not preserved on disk; name order is stable.
        members.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(members)
    }
}

#[async_trait]
impl DocumentFetcher for DirectoryFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, company_id: &str, fiscal_year: i32) -> Result<Option<RawDocument>> {
        let company_dir = self.root.join(company_id);

        let file = company_dir.join(format!("{fiscal_year}.xml"));
        match tokio::fs::read(&file).await {
            Ok(bytes) => {
                debug!(path = %file.display(), bytes = bytes.len(), "Read filing body");
                return Ok(Some(RawDocument::new(company_id, fiscal_year, bytes)));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io(file, e)),
        }

        let archive_dir = company_dir.join(fiscal_year.to_string());
        if !tokio::fs::try_exists(&archive_dir).await.unwrap_or(false) {
            debug!("No filing on disk");
            return Ok(None);
        }

        let members = self.read_members(&archive_dir).await?;
        match select_annual_report(members) {
            Ok(bytes) => Ok(Some(RawDocument::new(company_id, fiscal_year, bytes))),
            Err(XbrlError::AnnualReportNotFound { members }) => {
                debug!(members, "No annual report among archive members");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Serves documents held in memory.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    documents: RwLock<HashMap<(String, i32), Vec<u8>>>,
}

impl MemoryFetcher {
    /// Creates an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document, consuming and returning the fetcher.
    pub fn with_document(
        mut self,
        company_id: impl Into<String>,
        fiscal_year: i32,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.documents
            .get_mut()
            .insert((company_id.into(), fiscal_year), bytes.into());
        self
    }

    /// Adds or replaces a document.
    pub async fn insert(
        &self,
        company_id: impl Into<String>,
        fiscal_year: i32,
        bytes: impl Into<Vec<u8>>,
    ) {
        self.documents
            .write()
            .await
            .insert((company_id.into(), fiscal_year), bytes.into());
    }
}

#[async_trait]
impl DocumentFetcher for MemoryFetcher {
    async fn fetch(&self, company_id: &str, fiscal_year: i32) -> Result<Option<RawDocument>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&(company_id.to_string(), fiscal_year))
            .map(|bytes| RawDocument::new(company_id, fiscal_year, bytes.clone())))
    }
}
