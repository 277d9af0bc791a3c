//! Saigon CLI binary.
//!
//! Fetches VN30 price histories from CafeF and runs the CAPM analytics on the
//! cleaned tables.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use saigon::pipeline::{AcquisitionSummary, Analysis, TableSummary, capm_rows, portfolio_rows};
use saigon::{Sector, SaigonConfig, Universe, Vn30Universe, acquire, analyze, write_reports};
use saigon_data::cafef::CafefClient;
use saigon_data::{FailurePolicy, InstrumentOutcome, InstrumentReport};
use saigon_output::{ExportFormat, TextTable, capm_table, portfolio_table};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "saigon")]
#[command(about = "Saigon: VN30 price acquisition and CAPM analytics", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of the raw and cleaned tables
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory of the reports and charts
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FetchArgs {
    /// First day requested (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day requested (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Stop at the first failed instrument
    #[arg(long)]
    fail_fast: bool,

    /// Requests kept in flight
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Instrument to forecast
    #[arg(long)]
    symbol: Option<String>,

    /// Business days to forecast
    #[arg(long)]
    steps: Option<usize>,

    /// Report table format (csv, json, pretty_json)
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Print the summaries as Markdown
    #[arg(long)]
    markdown: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, persist and clean the price tables
    Fetch(FetchArgs),

    /// Run the analytics on the cleaned tables
    Analyze(AnalyzeArgs),

    /// Fetch, then analyze
    Run {
        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        analyze: AnalyzeArgs,
    },

    /// List the VN30 constituents
    Universe {
        /// Filter by sector
        #[arg(long)]
        sector: Option<String>,

        /// List all sectors
        #[arg(long)]
        list_sectors: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => SaigonConfig::load(path)?,
        None => SaigonConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.paths.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.paths.output_dir = dir.clone();
    }

    match cli.command {
        Commands::Fetch(args) => {
            apply_fetch_args(&mut config, &args);
            fetch(&config).await?;
        }
        Commands::Analyze(args) => {
            apply_analyze_args(&mut config, &args);
            run_analysis(&config, args.markdown)?;
        }
        Commands::Run { fetch: f, analyze: a } => {
            apply_fetch_args(&mut config, &f);
            apply_analyze_args(&mut config, &a);
            fetch(&config).await?;
            run_analysis(&config, a.markdown)?;
        }
        Commands::Universe {
            sector,
            list_sectors,
        } => {
            if list_sectors {
                list_all_sectors();
            } else {
                list_universe(sector)?;
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn apply_fetch_args(config: &mut SaigonConfig, args: &FetchArgs) {
    if let Some(start) = args.start {
        config.fetch.start = start;
    }
    if let Some(end) = args.end {
        config.fetch.end = end;
    }
    if args.fail_fast {
        config.fetch.aggregate.policy = FailurePolicy::FailFast;
    }
    if let Some(concurrency) = args.concurrency {
        config.fetch.aggregate.concurrency = concurrency;
    }
}

fn apply_analyze_args(config: &mut SaigonConfig, args: &AnalyzeArgs) {
    if let Some(symbol) = &args.symbol {
        config.analysis.forecast.symbol = symbol.to_uppercase();
    }
    if let Some(steps) = args.steps {
        config.analysis.forecast.steps = steps;
    }
    if let Some(format) = args.format {
        config.analysis.format = format;
    }
}

async fn fetch(config: &SaigonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = CafefClient::with_config(config.fetch.client.clone())?;

    println!("\nFetching {} instruments and {}", config.fetch.symbols.len(), config.fetch.benchmark);
    println!("Period: {} to {}\n", config.fetch.start, config.fetch.end);

    let pb = ProgressBar::new(config.fetch.symbols.len() as u64 + 1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let on_progress = |report: &InstrumentReport| {
        match &report.outcome {
            InstrumentOutcome::Fetched { rows } => {
                pb.set_message(format!("{} ({rows} rows)", report.symbol));
            }
            InstrumentOutcome::Backup { rows } => {
                pb.println(format!("  {}: fetch failed, {rows} rows from backup", report.symbol));
            }
            InstrumentOutcome::Failed { reason } => {
                pb.println(format!("  {}: no data ({reason})", report.symbol));
            }
        }
        pb.inc(1);
    };
    let result = acquire(&client, config, on_progress).await;
    pb.finish_and_clear();

    print_acquisition(&result?);
    Ok(())
}

fn print_acquisition(summary: &AcquisitionSummary) {
    let mut table = TextTable::new(
        "Acquisition",
        &["Table", "Instruments", "Backup", "Failed", "Rows In", "Rows Out", "Filled"],
    );
    for (name, t) in [("Constituents", &summary.universe), ("Benchmark", &summary.benchmark)] {
        table.push_row(table_row(name, t));
    }
    print!("{}", table);

    if let Some(report) = &summary.risk_free {
        println!("Risk-free rate: {} rows cleaned", report.rows_out);
    } else {
        println!("Risk-free rate: source table not found, not cleaned");
    }
    println!("Clean tables: {}", summary.universe.clean_path.display());
    println!("              {}", summary.benchmark.clean_path.display());
}

fn table_row(name: &str, t: &TableSummary) -> Vec<String> {
    let backup = t
        .outcomes
        .iter()
        .filter(|r| matches!(r.outcome, InstrumentOutcome::Backup { .. }))
        .count();
    vec![
        name.to_string(),
        t.outcomes.len().to_string(),
        backup.to_string(),
        t.failed().len().to_string(),
        t.report.rows_in.to_string(),
        t.report.rows_out.to_string(),
        t.report.values_filled.to_string(),
    ]
}

fn run_analysis(config: &SaigonConfig, markdown: bool) -> Result<(), Box<dyn std::error::Error>> {
    let analysis = analyze(config)?;
    let written = write_reports(&analysis, config)?;

    print_analysis(&analysis, markdown);
    println!(
        "\n{} reports written to {}",
        written.len(),
        config.paths.output_dir.display()
    );
    Ok(())
}

fn print_analysis(analysis: &Analysis, markdown: bool) {
    let prepared = &analysis.prepared;
    println!("\nInstruments: {}", prepared.prices.ncols());
    println!("With full history: {}", prepared.working.ncols());
    let excluded = prepared.coverage.insufficient();
    if !excluded.is_empty() {
        println!("Excluded (insufficient history): {}", excluded.join(", "));
    }

    match &analysis.forecast {
        Some(f) => {
            println!(
                "\nForecast {}: {} ADF p-value {:.4}, {} business days to {:.2}",
                f.symbol,
                f.selection.best.order,
                f.adf.p_value,
                f.dates.len(),
                f.price_path.last().copied().unwrap_or(f64::NAN)
            );
        }
        None => println!("\nForecast: skipped"),
    }

    let tables = [
        capm_table(&capm_rows(&analysis.capm.results)),
        portfolio_table(&portfolio_rows(&analysis.portfolios)),
    ];
    for table in &tables {
        if markdown {
            println!("\n{}", table.to_markdown());
        } else {
            print!("{}", table);
        }
    }
}

fn list_universe(sector_filter: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let universe = Vn30Universe::new();

    println!("VN30 Universe (benchmark {})", Universe::benchmark(&universe));
    println!("==============================\n");

    if let Some(sector_name) = sector_filter {
        let sector = parse_sector(&sector_name)?;
        let symbols: Vec<&str> = universe
            .constituents()
            .iter()
            .filter(|c| c.sector == sector)
            .map(|c| c.symbol.as_str())
            .collect();

        println!("Sector: {}", sector);
        println!("Constituents: {}\n", symbols.len());

        for symbol in symbols {
            println!("  {}", symbol);
        }
    } else {
        let sector_counts = universe.sector_counts();

        println!("Total constituents: {}\n", universe.size());
        println!("Breakdown by sector:");

        for sector in Sector::all() {
            let count = sector_counts.get(&sector).unwrap_or(&0);
            println!("  {:30} {:3} stocks", sector.name(), count);
        }
    }

    Ok(())
}

fn list_all_sectors() {
    println!("Sectors:");
    println!("========\n");

    for sector in Sector::all() {
        println!("  {}", sector.name());
    }
}

fn parse_sector(name: &str) -> Result<Sector, Box<dyn std::error::Error>> {
    let normalized = name.to_lowercase().replace([' ', '-', '_'], "");
    Sector::all()
        .into_iter()
        .find(|s| s.name().to_lowercase().replace(' ', "") == normalized)
        .ok_or_else(|| format!("Unknown sector: {}", name).into())
}
