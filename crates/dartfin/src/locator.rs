//! Filing discovery contract.
//!
//! Locating the annual report of a company lives outside this crate. A
//! [`ReportLocator`] pages through a filing listing for the submission
//! window of a fiscal year; a [`FilingDownloader`] turns the chosen filing
//! into archive members. [`LocatedFetcher`] combines the two into a
//! [`DocumentFetcher`].

use crate::error::{PipelineError, Result};
use crate::fetcher::DocumentFetcher;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use dartfin_xbrl::{RawDocument, XbrlError, select_annual_report};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, instrument, warn};

/// Report-name marker of an annual business report.
pub const ANNUAL_REPORT_NAME_MARKER: &str = "사업보고서";

/// Returns true if a listing entry names an annual business report.
pub fn is_annual_report_name(report_name: &str) -> bool {
    report_name.contains(ANNUAL_REPORT_NAME_MARKER)
}

/// Submission window of annual reports for a fiscal year: March 1 to
/// April 30 of the following year, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualFilingWindow {
    /// First day of the window
    pub begin: NaiveDate,
    /// Last day of the window
    pub end: NaiveDate,
}

impl AnnualFilingWindow {
    /// Window for filings covering `fiscal_year`.
    ///
    /// Returns `None` only for years outside the calendar range.
    pub fn for_fiscal_year(fiscal_year: i32) -> Option<Self> {
        let year = fiscal_year.checked_add(1)?;
        Some(Self {
            begin: NaiveDate::from_ymd_opt(year, 3, 1)?,
            end: NaiveDate::from_ymd_opt(year, 4, 30)?,
        })
    }

    /// Fiscal year the window belongs to.
    pub fn fiscal_year(&self) -> i32 {
        self.begin.year() - 1
    }

    /// Returns true if `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.begin <= date && date <= self.end
    }

    /// Window bounds as `YYYYMMDD` query parameters.
    pub fn query_bounds(&self) -> (String, String) {
        (
            self.begin.format("%Y%m%d").to_string(),
            self.end.format("%Y%m%d").to_string(),
        )
    }
}

/// One entry of a filing listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingEntry {
    /// Receipt number identifying the filing
    pub receipt_no: String,
    /// Report name as listed
    pub report_name: String,
    /// Receipt date
    pub receipt_date: NaiveDate,
}

/// One page of a filing listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingPage {
    /// Entries on this page
    pub entries: Vec<FilingEntry>,
    /// 1-based page number
    pub page_no: u32,
    /// Number of pages in the listing
    pub total_page: u32,
}

/// Pages through a company's filings.
#[async_trait]
pub trait ReportLocator: Send + Sync + Debug {
    /// Fetches one listing page restricted to `window`.
    async fn list_page(
        &self,
        company_id: &str,
        window: &AnnualFilingWindow,
        page_no: u32,
    ) -> Result<FilingPage>;

    /// Finds the annual report for a fiscal year.
    ///
    /// Walks pages until a matching entry is found or `total_page` is
    /// exhausted. Entries dated outside the window are ignored even if the
    /// listing returns them. A listing that answers with a different page
    /// than the one requested is a [`PipelineError::Fetch`].
    async fn locate(&self, company_id: &str, fiscal_year: i32) -> Result<Option<FilingEntry>> {
        let Some(window) = AnnualFilingWindow::for_fiscal_year(fiscal_year) else {
            return Ok(None);
        };

        let mut page_no = 1;
        loop {
            let page = self.list_page(company_id, &window, page_no).await?;
            if page.page_no != page_no {
                return Err(PipelineError::Fetch(format!(
                    "listing returned page {} when page {page_no} was requested",
                    page.page_no
                )));
            }
            let found = page.entries.into_iter().find(|entry| {
                window.contains(entry.receipt_date) && is_annual_report_name(&entry.report_name)
            });
            if found.is_some() {
                return Ok(found);
            }
            if page.page_no >= page.total_page {
                return Ok(None);
            }
            page_no = page.page_no + 1;
        }
    }
}

/// Downloads a located filing as named archive members.
#[async_trait]
pub trait FilingDownloader: Send + Sync + Debug {
    /// Returns the `(name, bytes)` members of the filing archive.
    async fn download(&self, filing: &FilingEntry) -> Result<Vec<(String, Vec<u8>)>>;
}

/// [`DocumentFetcher`] built from a locator and a downloader.
#[derive(Debug)]
pub struct LocatedFetcher<L, D> {
    locator: L,
    downloader: D,
}

impl<L, D> LocatedFetcher<L, D> {
    /// Combines a locator and a downloader.
    pub const fn new(locator: L, downloader: D) -> Self {
        Self {
            locator,
            downloader,
        }
    }
}

#[async_trait]
impl<L: ReportLocator, D: FilingDownloader> DocumentFetcher for LocatedFetcher<L, D> {
    #[instrument(skip(self))]
    async fn fetch(&self, company_id: &str, fiscal_year: i32) -> Result<Option<RawDocument>> {
        let Some(filing) = self.locator.locate(company_id, fiscal_year).await? else {
            debug!("No annual report filed in window");
            return Ok(None);
        };

        let members = self.downloader.download(&filing).await?;
        if members.is_empty() {
            return Err(PipelineError::Fetch(format!(
                "filing {} downloaded as an empty archive",
                filing.receipt_no
            )));
        }
        match select_annual_report(members) {
            Ok(bytes) => Ok(Some(RawDocument::new(company_id, fiscal_year, bytes))),
            Err(XbrlError::AnnualReportNotFound { members }) => {
                warn!(
                    receipt_no = %filing.receipt_no,
                    members,
                    "Filing archive has no annual report body"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
