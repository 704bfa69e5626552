//! Rebalancing backtest.
//!
//! - Event filtering into deletion and addition streams
//! - Per-event option trade evaluation
//! - Ledger aggregation and capital curve
//! - Pipeline runner tying the stages together

pub mod aggregator;
pub mod engine;
pub mod evaluator;
pub mod filter;

pub use aggregator::{running_capital, Aggregate, Aggregator, AggregatorConfig, CapitalPoint, LedgerRow};
pub use engine::{BacktestConfig, BacktestReport, PipelineResult, RebalanceBacktest, RunProgress};
pub use evaluator::{
    EvaluatorConfig, SkipKind, SkipReason, SkippedEvent, TradeEvaluator, TradeOutcome,
};
pub use filter::{EventFilter, EventStreams};
