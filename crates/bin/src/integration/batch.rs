//! Batch extraction over companies and fiscal years.

use dartfin::{Pipeline, UnitOutcome, UnitResult};
use futures::StreamExt;
use indicatif::ProgressBar;
use tracing::warn;

/// Tally of a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchSummary {
    pub(crate) extracted: usize,
    pub(crate) not_found: usize,
    pub(crate) unparsed: usize,
    pub(crate) failed: usize,
    pub(crate) fields_written: usize,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, unit: &UnitResult) {
        match &unit.result {
            Ok(UnitOutcome::Extracted(report)) => {
                self.extracted += 1;
                if report.is_unparsed() {
                    self.unparsed += 1;
                }
                self.fields_written += report.reconcile.as_ref().map_or(0, |r| r.written);
            }
            Ok(UnitOutcome::DocumentNotFound { .. }) => self.not_found += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub(crate) const fn total(&self) -> usize {
        self.extracted + self.not_found + self.failed
    }
}

/// Every (company, year) pair, company-major.
pub(crate) fn units(companies: &[String], from_year: i32, to_year: i32) -> Vec<(String, i32)> {
    companies
        .iter()
        .flat_map(|company| (from_year..=to_year).map(move |year| (company.clone(), year)))
        .collect()
}

/// Run the pipeline over `units`, reporting each completion on `progress`.
pub(crate) async fn run_with_progress(
    pipeline: &Pipeline,
    units: Vec<(String, i32)>,
    progress: Option<&ProgressBar>,
) -> BatchSummary {
    if let Some(pb) = progress {
        pb.set_length(units.len() as u64);
        pb.set_position(0);
    }

    let mut summary = BatchSummary::default();
    let mut results = std::pin::pin!(pipeline.run_stream(units));
    while let Some(unit) = results.next().await {
        if let Err(e) = &unit.result {
            let report = || {
                warn!(
                    company_id = %unit.company_id,
                    fiscal_year = unit.fiscal_year,
                    error = %e,
                    "Unit failed"
                );
            };
            match progress {
                Some(pb) => pb.suspend(report),
                None => report(),
            }
        }
        summary.record(&unit);
        if let Some(pb) = progress {
            pb.inc(1);
            pb.set_message(format!("{}/{}", unit.company_id, unit.fiscal_year));
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use dartfin::ledger::InMemoryStore;
    use dartfin::{MemoryFetcher, PipelineConfig};
    use std::sync::Arc;

    const FILING: &str = r#"<DOCUMENT><DOCUMENT-NAME ACODE="11011">사업보고서</DOCUMENT-NAME><TABLE>
<TR><TE ACODE="ifrs-full_Equity" ACONTEXT="CFY2024eFY" ADECIMAL="-6"><P>10</P></TE></TR>
</TABLE></DOCUMENT>"#;

    #[test]
    fn test_units_cover_every_year() {
        let companies = vec!["00126380".to_string(), "00164779".to_string()];
        let units = units(&companies, 2022, 2024);

        assert_eq!(units.len(), 6);
        assert_eq!(units[0], ("00126380".to_string(), 2022));
        assert_eq!(units[5], ("00164779".to_string(), 2024));
        assert!(super::units(&companies, 2024, 2023).is_empty());
    }

    #[tokio::test]
    async fn test_summary_counts_outcomes() {
        let fetcher = MemoryFetcher::new().with_document("00126380", 2024, FILING);
        let pipeline = Pipeline::from_config(&PipelineConfig::default(), Arc::new(fetcher))
            .unwrap()
            .with_store(Arc::new(InMemoryStore::new()));

        let summary = run_with_progress(
            &pipeline,
            units(&["00126380".to_string()], 2023, 2024),
            None,
        )
        .await;

        assert_eq!(
            summary,
            BatchSummary {
                extracted: 1,
                not_found: 1,
                unparsed: 0,
                failed: 0,
                fields_written: 1,
            }
        );
        assert_eq!(summary.total(), 2);
    }
}
