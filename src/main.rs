//! SuperTrend scanner - main entry point
//!
//! Scans the configured watchlist once and writes the dashboard data file.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use supertrend_scanner::data::{BarSource, CsvBarSource, DataSource, YahooFinanceFetcher};
use supertrend_scanner::{report, scanner, ScannerConfig};

#[derive(Parser, Debug)]
#[command(name = "supertrend-scanner")]
#[command(about = "Scan a watchlist for SuperTrend direction and flips", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (built-in watchlist when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Data source: yahoo or csv (overrides config)
    #[arg(long)]
    source: Option<DataSource>,

    /// Directory of CSV files for the csv source (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Scan instruments one at a time instead of in parallel
    #[arg(long)]
    sequential: bool,

    /// Also write logs to a file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool, log_dir: Option<&PathBuf>) -> Result<()> {
    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let log_filename = format!(
                "scan_{}.log",
                chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
            );
            let file_appender = tracing_appender::rolling::never(dir, log_filename);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

fn build_source(config: &ScannerConfig) -> Result<Box<dyn BarSource>> {
    let source: Box<dyn BarSource> = match config.data.source {
        DataSource::Yahoo => Box::new(YahooFinanceFetcher::new()?),
        DataSource::Csv => Box::new(CsvBarSource::new(&config.data.data_dir)),
    };
    Ok(source)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.log_dir.as_ref())?;

    let mut config = match &cli.config {
        Some(path) => {
            let config = ScannerConfig::from_file(path)?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => ScannerConfig::default(),
    };

    // Apply overrides
    if let Some(output) = cli.output {
        config.output.path = output;
    }
    if let Some(source) = cli.source {
        config.data.source = source;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    config.validate()?;

    info!("Fetching market data from {}", config.data.source);
    let source = build_source(&config)?;

    let progress_bar = ProgressBar::new(config.instruments.len() as u64);
    progress_bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=> "),
    );

    let outcome = scanner::run_batch(source.as_ref(), &config, cli.sequential, progress_bar);

    report::write_report(&config.output.path, &outcome.reports, &config.output.variable)?;
    report::print_summary(&outcome.reports, outcome.failures.len());

    Ok(())
}
