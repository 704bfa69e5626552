//! S&P 500 rebalancing options backtest.
//!
//! # Usage
//!
//! ```bash
//! # Set API keys (or put them in .env)
//! export FMP_API_KEY=your-key
//! export POLYGON_API_KEY=your-key
//!
//! # Run with the default cutoff and SBNY excluded from deletions
//! rebalance-backtest
//!
//! # Different cutoff, extra exclusions, no chart output
//! rebalance-backtest --start-date 2022-06-01 --exclude SBNY --exclude FRC --no-charts
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use rebalance_backtest::backtest::{BacktestConfig, RebalanceBacktest, RunProgress};
use rebalance_backtest::config::Credentials;
use rebalance_backtest::data::{ProviderClient, ReqwestFetcher, ResponseCache};
use rebalance_backtest::report::{CurveReporter, NoopReporter, SvgChartReporter};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "rebalance-backtest")]
#[command(about = "Backtest option trades around S&P 500 constituent changes")]
#[command(version)]
struct Cli {
    /// Earliest effective date traded (YYYY-MM-DD)
    #[arg(long, default_value = "2023-01-01")]
    start_date: NaiveDate,

    /// Directory for charts and trade ledgers
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Ticker dropped from the deletions ledger (repeatable)
    #[arg(long = "exclude", default_values_t = vec!["SBNY".to_string()])]
    excluded: Vec<String>,

    /// Distinct provider responses kept in memory
    #[arg(long, default_value_t = 500)]
    cache_capacity: usize,

    /// Skip writing charts and ledgers
    #[arg(long)]
    no_charts: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rebalance_backtest=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let credentials = Credentials::from_env().context("Failed to load API credentials")?;

    let config = BacktestConfig {
        start_date: cli.start_date,
        excluded_deletions: cli.excluded,
        cache_capacity: cli.cache_capacity,
        ..BacktestConfig::default()
    };

    let fetcher = ReqwestFetcher::new().context("Failed to build HTTP client")?;
    let cache = ResponseCache::new(fetcher, config.cache_capacity);
    let mut client = ProviderClient::new(cache, credentials, config.endpoints.clone());

    let changes = client
        .constituent_changes()
        .await
        .context("Failed to fetch S&P 500 constituent changes")?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let backtest = RebalanceBacktest::new(config);
    let report = backtest
        .run(&mut client, &changes, |update| match update {
            RunProgress::Started { total } => pb.set_length(total as u64),
            RunProgress::Evaluated {
                change_type, ticker, ..
            } => {
                pb.set_message(format!("{} {}", change_type.as_str(), ticker));
                pb.inc(1);
            }
        })
        .await;
    pb.finish_with_message("complete");

    println!("{}", SEPARATOR);
    println!("{}", report.summary());
    println!("{}", SEPARATOR);

    let reporter: Box<dyn CurveReporter> = if cli.no_charts {
        Box::new(NoopReporter)
    } else {
        Box::new(SvgChartReporter::new(cli.output_dir.clone()))
    };

    for pipeline in report.pipelines() {
        reporter
            .render(pipeline.name(), &pipeline.aggregate)
            .with_context(|| format!("Failed to render {} chart", pipeline.name()))?;
    }

    let stats = client.cache_stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        "response cache"
    );

    Ok(())
}
