//! dartfin CLI binary.
//!
//! Provides command-line interface for DART annual-report indicator extraction.

mod integration;

use clap::{ArgAction, Parser, Subcommand};
use dartfin::indicators::{Absence, IndicatorValue};
use dartfin::ledger::{ExportFormat, Exporter, RecordStore, to_dataframe};
use dartfin::xbrl::{EligibilityPolicy, RawDocument};
use dartfin::{DirectoryFetcher, ExtractionReport, MemoryFetcher, Pipeline, PipelineConfig};
use indicatif::{ProgressBar, ProgressStyle};
use integration::batch::{run_with_progress, units};
use integration::store_manager::{open_store, print_store_info, store_path};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dartfin")]
#[command(about = "Financial indicators from DART annual-report filings", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Custom alias table (JSON)
    #[arg(long, global = true)]
    aliases: Option<PathBuf>,

    /// Accept only full-year duration contexts
    #[arg(long, global = true)]
    duration_only: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract indicators from one filing body
    Extract {
        /// Filing XML file
        file: PathBuf,

        /// DART corporation code
        #[arg(long)]
        company: String,

        /// Fiscal year of the filing
        #[arg(long)]
        year: i32,

        /// Persist into this store
        #[arg(long)]
        db: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract every company and year found under a directory
    Collect {
        /// Directory laid out as <company>/<year>.xml or <company>/<year>/*.xml
        #[arg(long)]
        root: PathBuf,

        /// First fiscal year
        #[arg(long)]
        from_year: i32,

        /// Last fiscal year
        #[arg(long)]
        to_year: i32,

        /// Restrict to these companies (comma separated)
        #[arg(long, value_delimiter = ',')]
        companies: Vec<String>,

        /// Store path (defaults to the platform data directory)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Units processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show stored records of a company
    Show {
        /// DART corporation code
        company: String,

        /// Store path (defaults to the platform data directory)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output format (table, csv, json or pretty-json)
        #[arg(long, default_value = "table")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the alias table
    Aliases {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = &cli.aliases {
        config.alias_path = Some(path.clone());
    }
    if cli.duration_only {
        config.eligibility = EligibilityPolicy::duration_only();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Extract {
            file,
            company,
            year,
            db,
            json,
        } => {
            extract_file(&config, &file, &company, year, db.as_deref(), json).await?;
        }
        Commands::Collect {
            root,
            from_year,
            to_year,
            companies,
            db,
            concurrency,
        } => {
            let mut config = config;
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            collect(&config, root, from_year, to_year, companies, db.as_deref()).await?;
        }
        Commands::Show {
            company,
            db,
            format,
            output,
        } => {
            show_company(&company, db.as_deref(), &format, output.as_deref()).await?;
        }
        Commands::Aliases { json } => {
            list_aliases(&config, json)?;
        }
    }

    Ok(())
}

async fn extract_file(
    config: &PipelineConfig,
    file: &Path,
    company: &str,
    year: i32,
    db: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(file)?;
    let document = RawDocument::new(company, year, bytes);

    let mut pipeline = Pipeline::from_config(config, Arc::new(MemoryFetcher::new()))?;
    if let Some(path) = db {
        pipeline = pipeline.with_store(Arc::new(open_store(path)?));
    }

    let report = pipeline.process(document).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn collect(
    config: &PipelineConfig,
    root: PathBuf,
    from_year: i32,
    to_year: i32,
    companies: Vec<String>,
    db: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if from_year > to_year {
        return Err(format!("--from-year {} is after --to-year {}", from_year, to_year).into());
    }

    let fetcher = DirectoryFetcher::new(root);
    let companies = if companies.is_empty() {
        fetcher.companies().await?
    } else {
        companies
    };

    let path = store_path(db);
    let store = Arc::new(open_store(&path)?);
    let pipeline = Pipeline::from_config(config, Arc::new(fetcher))?.with_store(store.clone());

    println!("Collecting {} companies, fiscal years {}-{}", companies.len(), from_year, to_year);
    print_store_info(store.as_ref(), &path).await;

    let units = units(&companies, from_year, to_year);
    let pb = ProgressBar::new(units.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let summary = run_with_progress(&pipeline, units, Some(&pb)).await;
    pb.finish_with_message(format!("{} units", summary.total()));

    println!("\nExtracted:      {}", summary.extracted);
    println!("No filing:      {}", summary.not_found);
    println!("Unparsed:       {}", summary.unparsed);
    println!("Failed:         {}", summary.failed);
    println!("Fields written: {}", summary.fields_written);

    if summary.failed > 0 {
        return Err(format!("{} units failed", summary.failed).into());
    }
    Ok(())
}

async fn show_company(
    company: &str,
    db: Option<&Path>,
    format: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&store_path(db))?;
    let state = store.load_company(company).await?;
    if state.is_empty() {
        return Err(format!("No records for company {}", company).into());
    }

    if format.eq_ignore_ascii_case("table") {
        let records: Vec<_> = state.iter().cloned().collect();
        let df = to_dataframe(&records)?;
        match output {
            Some(path) => std::fs::write(path, df.to_string())?,
            None => println!("{}", df),
        }
        return Ok(());
    }

    let format: ExportFormat = format.parse()?;
    match output {
        Some(path) => {
            state.export_to_file(path, format)?;
            println!("Wrote {} records to {}", state.len(), path.display());
        }
        None => print!("{}", state.export_to_string(format)?),
    }
    Ok(())
}

fn list_aliases(config: &PipelineConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let aliases = config.load_aliases()?;

    if json {
        let entries: serde_json::Map<String, serde_json::Value> = aliases
            .iter()
            .map(|alias| {
                (
                    alias.name.clone(),
                    serde_json::json!({
                        "primary_code": alias.primary_code,
                        "candidate_codes": alias.candidate_codes,
                        "description": alias.description,
                    }),
                )
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Indicators ({}):", aliases.len());
    println!("================\n");
    for alias in aliases.iter() {
        println!("{:<40} {}", alias.name, alias.primary_code);
        for candidate in &alias.candidate_codes {
            println!("{:<40} {}", "", candidate);
        }
    }
    Ok(())
}

fn print_report(report: &ExtractionReport) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!(
        "║{:^62}║",
        format!("EXTRACTION: {} / {}", report.company_id, report.fiscal_year)
    );
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Parse tier: {}", report.tier);
    for failure in &report.tier_failures {
        println!("  {} gave up: {}", failure.tier, failure.reason);
    }
    println!(
        "Tags: {} total, {} coded, {} eligible, {} rejected, {} blank",
        report.parse.total_tags,
        report.parse.coded_tags,
        report.filter.eligible_tags,
        report.filter.rejected_tags,
        report.filter.blank_values
    );
    println!("Code index: {} codes\n", report.filter.code_index_size);

    for (name, outcome) in report.indicators.iter() {
        println!("  {:<40} {:>24}", name, describe(outcome));
    }

    println!(
        "\nFound {} of {} indicators",
        report.found_count(),
        report.indicators.len()
    );
    if let Some(stored) = &report.reconcile {
        println!(
            "Stored: version {}, {} written, {} unchanged, {} kept",
            stored.version, stored.written, stored.unchanged, stored.kept
        );
    }
}

fn describe(outcome: &IndicatorValue) -> String {
    match outcome {
        IndicatorValue::Found { value } => group_thousands(*value),
        IndicatorValue::NotFound(absence) => match absence {
            Absence::CodeAbsent => "- (no code)".to_string(),
            Absence::ContextIneligible => "- (other period)".to_string(),
            Absence::BlankValue => "- (blank)".to_string(),
            Absence::Unparsable { raw, .. } => format!("- (unparsable {:?})", raw),
        },
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
