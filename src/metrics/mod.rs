//! Performance metrics for the rebalancing pipelines.
//!
//! - Win rate and profit factor
//! - Dollar P&L after the contract multiplier
//! - Total return and drawdown of the capital curve

pub mod calculator;

pub use calculator::{DrawdownAnalysis, MetricsCalculator, PerformanceMetrics};
