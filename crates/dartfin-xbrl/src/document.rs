//! Raw filing documents as handed to the parser.

use crate::error::{Result, XbrlError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker present in the main body document of a DART filing.
pub const DOCUMENT_NAME_MARKER: &str = "DOCUMENT-NAME";

/// Document code attribute identifying an annual report (사업보고서).
pub const ANNUAL_REPORT_MARKER: &str = r#"ACODE="11011""#;

/// The bytes of one annual filing document for a company and fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    /// DART corporation code
    pub company_id: String,

    /// Fiscal year the filing reports on
    pub fiscal_year: i32,

    /// Document bytes, nominally UTF-8
    pub bytes: Vec<u8>,
}

impl RawDocument {
    /// Creates a document from its parts.
    pub fn new(company_id: impl Into<String>, fiscal_year: i32, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            company_id: company_id.into(),
            fiscal_year,
            bytes: bytes.into(),
        }
    }

    /// Document size in bytes.
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the document has no content.
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true if the bytes carry both the document-name and annual-report markers.
    pub fn looks_like_annual_report(&self) -> bool {
        is_annual_report_body(&self.bytes)
    }
}

/// Returns true if `bytes` carries the annual report markers.
pub fn is_annual_report_body(bytes: &[u8]) -> bool {
    contains(bytes, DOCUMENT_NAME_MARKER.as_bytes()) && contains(bytes, ANNUAL_REPORT_MARKER.as_bytes())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Picks the annual report body out of the members of a filing archive.
///
/// A filing ships several `.xml` documents (body, attachments, audit report).
/// The first `.xml` member carrying both markers wins.
pub fn select_annual_report<N, B, I>(members: I) -> Result<Vec<u8>>
where
    N: AsRef<str>,
    B: Into<Vec<u8>> + AsRef<[u8]>,
    I: IntoIterator<Item = (N, B)>,
{
    let mut inspected = 0;
    for (name, bytes) in members {
        inspected += 1;
        let name = name.as_ref();
        if !name.to_ascii_lowercase().ends_with(".xml") {
            continue;
        }
        if is_annual_report_body(bytes.as_ref()) {
            debug!(member = name, "Selected annual report member");
            return Ok(bytes.into());
        }
    }

    Err(XbrlError::AnnualReportNotFound {
        members: inspected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"<DOCUMENT><DOCUMENT-NAME ACODE="11011">사업보고서</DOCUMENT-NAME></DOCUMENT>"#;
    const AUDIT: &str = r#"<DOCUMENT><DOCUMENT-NAME ACODE="00760">감사보고서</DOCUMENT-NAME></DOCUMENT>"#;

    #[test]
    fn test_select_skips_other_documents() {
        let members = vec![
            ("00126380_00760.xml", AUDIT.as_bytes().to_vec()),
            ("readme.txt", BODY.as_bytes().to_vec()),
            ("00126380.xml", BODY.as_bytes().to_vec()),
        ];
        let selected = select_annual_report(members).unwrap();
        assert_eq!(selected, BODY.as_bytes());
    }

    #[test]
    fn test_select_reports_missing_body() {
        let members = vec![("a.xml", AUDIT.as_bytes().to_vec())];
        let err = select_annual_report(members).unwrap_err();
        assert!(matches!(err, XbrlError::AnnualReportNotFound { members: 1 }));
    }

    #[test]
    fn test_raw_document_markers() {
        let doc = RawDocument::new("00126380", 2024, BODY);
        assert!(doc.looks_like_annual_report());
        assert_eq!(doc.len(), BODY.len());

        let empty = RawDocument::new("00126380", 2024, Vec::new());
        assert!(empty.is_empty());
        assert!(!empty.looks_like_annual_report());
    }
}
