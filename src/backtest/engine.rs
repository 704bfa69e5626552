//! Rebalancing backtest runner.
//!
//! Runs the two pipelines over the constituent feed:
//! 1. Filter the feed into deletion and addition events
//! 2. Evaluate deletions with puts, one event at a time in feed order
//! 3. Evaluate additions with calls
//! 4. Aggregate each pipeline into a ledger, capital curve and metrics

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ProviderEndpoints;
use crate::data::cache::DEFAULT_CACHE_CAPACITY;
use crate::data::{ChangeType, ConstituentChange, ConstituentChangeEvent, MarketData, OptionType};
use crate::metrics::{MetricsCalculator, PerformanceMetrics};

use super::aggregator::{Aggregate, Aggregator, AggregatorConfig};
use super::evaluator::{EvaluatorConfig, TradeEvaluator};
use super::filter::EventFilter;

/// Configuration for a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Earliest effective date traded.
    pub start_date: NaiveDate,

    /// Starting capital of each pipeline.
    pub initial_capital: Decimal,

    /// Shares per option contract.
    pub contract_multiplier: Decimal,

    /// Tickers dropped from the deletions ledger.
    #[serde(default)]
    pub excluded_deletions: Vec<String>,

    /// Tickers dropped from the additions ledger.
    #[serde(default)]
    pub excluded_additions: Vec<String>,

    /// Distinct provider URLs kept in the response cache.
    pub cache_capacity: usize,

    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub endpoints: ProviderEndpoints,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            initial_capital: Decimal::from(1000),
            contract_multiplier: Decimal::from(100),
            excluded_deletions: vec!["SBNY".to_string()],
            excluded_additions: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            evaluator: EvaluatorConfig::default(),
            endpoints: ProviderEndpoints::default(),
        }
    }
}

/// Progress notifications emitted while a backtest runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunProgress<'a> {
    /// Events selected across both pipelines
    Started { total: usize },

    /// One event finished evaluating
    Evaluated {
        change_type: ChangeType,
        ticker: &'a str,
        filled: bool,
    },
}

/// Result of one pipeline (deletions or additions).
#[derive(Debug)]
pub struct PipelineResult {
    pub change_type: ChangeType,
    pub option_type: OptionType,

    /// Events evaluated
    pub events: usize,

    pub aggregate: Aggregate,
    pub metrics: PerformanceMetrics,
}

impl PipelineResult {
    pub fn name(&self) -> &'static str {
        self.change_type.as_str()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({}s, {} events)\n----------------------------------------\n{}",
            self.name(),
            self.option_type,
            self.events,
            self.metrics.summary()
        )
    }
}

/// Result of a completed backtest.
#[derive(Debug)]
pub struct BacktestReport {
    pub start_date: NaiveDate,
    pub deletions: PipelineResult,
    pub additions: PipelineResult,
}

impl BacktestReport {
    pub fn pipelines(&self) -> [&PipelineResult; 2] {
        [&self.deletions, &self.additions]
    }

    pub fn summary(&self) -> String {
        format!(
            "Rebalancing Backtest (effective on or after {})\n\n{}\n\n{}",
            self.start_date,
            self.deletions.summary(),
            self.additions.summary()
        )
    }
}

/// Runs both rebalancing pipelines against a market data provider.
pub struct RebalanceBacktest {
    config: BacktestConfig,
    evaluator: TradeEvaluator,
}

impl RebalanceBacktest {
    pub fn new(config: BacktestConfig) -> Self {
        let evaluator = TradeEvaluator::new(config.evaluator);
        Self { config, evaluator }
    }

    fn aggregator_for(&self, change_type: ChangeType) -> Aggregator {
        let excluded_tickers = match change_type {
            ChangeType::Removed => self.config.excluded_deletions.clone(),
            ChangeType::Added => self.config.excluded_additions.clone(),
        };

        Aggregator::new(AggregatorConfig {
            initial_capital: self.config.initial_capital,
            contract_multiplier: self.config.contract_multiplier,
            excluded_tickers,
        })
    }

    /// Filter `changes` and run the deletions then additions pipelines.
    pub async fn run<M, P>(
        &self,
        provider: &mut M,
        changes: &[ConstituentChange],
        mut progress: P,
    ) -> BacktestReport
    where
        M: MarketData + ?Sized,
        P: FnMut(RunProgress<'_>),
    {
        let streams = EventFilter::new(self.config.start_date).split(changes);
        info!(
            deletions = streams.deletions.len(),
            additions = streams.additions.len(),
            start_date = %self.config.start_date,
            "filtered constituent changes"
        );

        progress(RunProgress::Started {
            total: streams.len(),
        });

        let deletions = self
            .run_pipeline(provider, &streams.deletions, ChangeType::Removed, &mut progress)
            .await;
        let additions = self
            .run_pipeline(provider, &streams.additions, ChangeType::Added, &mut progress)
            .await;

        BacktestReport {
            start_date: self.config.start_date,
            deletions,
            additions,
        }
    }

    /// Evaluate `events` sequentially and aggregate the outcomes.
    pub async fn run_pipeline<M, P>(
        &self,
        provider: &mut M,
        events: &[ConstituentChangeEvent],
        change_type: ChangeType,
        progress: &mut P,
    ) -> PipelineResult
    where
        M: MarketData + ?Sized,
        P: FnMut(RunProgress<'_>),
    {
        let option_type = change_type.option_type();
        let mut outcomes = Vec::with_capacity(events.len());

        for event in events {
            let outcome = self.evaluator.evaluate(provider, event, option_type).await;
            progress(RunProgress::Evaluated {
                change_type,
                ticker: &event.symbol,
                filled: outcome.is_filled(),
            });
            outcomes.push(outcome);
        }

        let aggregate = self.aggregator_for(change_type).aggregate(outcomes);
        let metrics = MetricsCalculator::calculate(&aggregate);

        info!(
            pipeline = change_type.as_str(),
            events = events.len(),
            trades = metrics.total_trades,
            skipped = metrics.skipped_events,
            final_capital = %metrics.final_capital,
            "pipeline complete"
        );

        PipelineResult {
            change_type,
            option_type,
            events: events.len(),
            aggregate,
            metrics,
        }
    }
}
