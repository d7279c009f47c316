//! Fetch, parse, resolve and reconcile, one (company, fiscal year) at a time.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::fetcher::DocumentFetcher;
use crate::locks::KeyedLocks;
use crate::report::{ExtractionReport, UnitOutcome};
use dartfin_indicators::{AliasTable, IndicatorResolver};
use dartfin_ledger::{RecordStore, StoreReconciler};
use dartfin_xbrl::{ContextClassifier, RawDocument, StructuralParser};
use futures::stream::{self, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of one unit in a batch.
#[derive(Debug)]
pub struct UnitResult {
    /// Company identifier
    pub company_id: String,
    /// Target fiscal year
    pub fiscal_year: i32,
    /// What happened
    pub result: Result<UnitOutcome>,
}

/// Parses and resolves one document. Pure and CPU-bound.
fn extract(
    parser: &StructuralParser,
    resolver: &IndicatorResolver,
    aliases: &AliasTable,
    document: &RawDocument,
) -> ExtractionReport {
    let parsed = parser.parse(document);
    let (eligible, filter) = parsed.index.filter_eligible(
        &ContextClassifier::new(),
        document.fiscal_year,
        resolver.policy(),
    );
    let indicators = resolver.resolve(&eligible, aliases, document.fiscal_year);

    ExtractionReport {
        company_id: document.company_id.clone(),
        fiscal_year: document.fiscal_year,
        tier: parsed.tier,
        tier_failures: parsed.failures,
        parse: parsed.stats,
        filter,
        indicators,
        reconcile: None,
    }
}

/// Extraction pipeline.
///
/// Units for different keys run independently. Writes for the same key are
/// serialized by an in-process lock and, across processes, by the store's
/// versioned upsert.
pub struct Pipeline {
    fetcher: Arc<dyn DocumentFetcher>,
    store: Option<Arc<dyn RecordStore>>,
    aliases: Arc<AliasTable>,
    parser: StructuralParser,
    resolver: IndicatorResolver,
    reconciler: StoreReconciler,
    locks: Arc<KeyedLocks>,
    concurrency: usize,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("fetcher", &self.fetcher)
            .field("persisting", &self.store.is_some())
            .field("indicators", &self.aliases.len())
            .field("parser", &self.parser)
            .field("resolver", &self.resolver)
            .field("reconciler", &self.reconciler)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Pipeline {
    /// Creates a pipeline that resolves without persisting.
    pub fn new(
        config: &PipelineConfig,
        aliases: Arc<AliasTable>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            fetcher,
            store: None,
            aliases,
            parser: StructuralParser::new(config.parser),
            resolver: IndicatorResolver::new(config.eligibility),
            reconciler: config.reconciler(),
            locks: Arc::new(KeyedLocks::new()),
            concurrency: config.concurrency.max(1),
        }
    }

    /// Creates a pipeline, loading the alias table named by `config`.
    ///
    /// # Errors
    /// Fails if the alias table is malformed.
    pub fn from_config(config: &PipelineConfig, fetcher: Arc<dyn DocumentFetcher>) -> Result<Self> {
        Ok(Self::new(config, config.load_aliases()?, fetcher))
    }

    /// Persists every processed document into `store`.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Shares a lock table with other pipelines writing to the same store.
    pub fn with_locks(mut self, locks: Arc<KeyedLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Alias table in use.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Parses and resolves a document without touching the store.
    pub fn extract(&self, document: &RawDocument) -> ExtractionReport {
        extract(&self.parser, &self.resolver, &self.aliases, document)
    }

    /// Processes an already fetched document, persisting it if a store is set.
    #[instrument(skip(self, document), fields(company_id = %document.company_id, fiscal_year = document.fiscal_year))]
    pub async fn process(&self, document: RawDocument) -> Result<ExtractionReport> {
        let parser = self.parser.clone();
        let resolver = self.resolver;
        let aliases = Arc::clone(&self.aliases);
        let mut report =
            tokio::task::spawn_blocking(move || extract(&parser, &resolver, &aliases, &document))
                .await?;

        if let Some(store) = &self.store {
            let _guard = self
                .locks
                .lock(&report.company_id, report.fiscal_year)
                .await;
            let outcome = self
                .reconciler
                .reconcile(store.as_ref(), &report.company_id, &report.indicators)
                .await?;
            report.reconcile = Some(outcome);
        }

        info!(
            tier = %report.tier,
            total_tags = report.parse.total_tags,
            coded_tags = report.parse.coded_tags,
            eligible_tags = report.filter.eligible_tags,
            blank_values = report.filter.blank_values,
            code_index_size = report.filter.code_index_size,
            found = report.found_count(),
            missing = report.missing_count(),
            written = report.reconcile.as_ref().map_or(0, |r| r.written),
            outcomes = ?report.indicators.values,
            "Document processed"
        );

        Ok(report)
    }

    /// Fetches and processes one unit.
    #[instrument(skip(self))]
    pub async fn run(&self, company_id: &str, fiscal_year: i32) -> Result<UnitOutcome> {
        match self.fetcher.fetch(company_id, fiscal_year).await? {
            Some(document) => Ok(UnitOutcome::Extracted(Box::new(
                self.process(document).await?,
            ))),
            None => {
                info!("No document for unit");
                Ok(UnitOutcome::DocumentNotFound {
                    company_id: company_id.to_string(),
                    fiscal_year,
                })
            }
        }
    }

    /// Processes many units, yielding each result as it completes.
    ///
    /// At most `concurrency` units are in flight. A failing unit does not
    /// stop the others.
    pub fn run_stream<'a, I>(&'a self, units: I) -> impl Stream<Item = UnitResult> + 'a
    where
        I: IntoIterator<Item = (String, i32)>,
        I::IntoIter: 'a,
    {
        stream::iter(units)
            .map(move |(company_id, fiscal_year)| async move {
                let result = self.run(&company_id, fiscal_year).await;
                UnitResult {
                    company_id,
                    fiscal_year,
                    result,
                }
            })
            .buffer_unordered(self.concurrency)
    }

    /// Processes many units and collects their results in completion order.
    pub async fn run_many<I>(&self, units: I) -> Vec<UnitResult>
    where
        I: IntoIterator<Item = (String, i32)>,
    {
        self.run_stream(units).collect().await
    }
}
