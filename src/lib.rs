pub mod backtest;
pub mod config;
pub mod data;
pub mod metrics;
pub mod report;

// Re-export commonly used types
pub use backtest::{
    Aggregate, Aggregator, BacktestConfig, BacktestReport, EventFilter, PipelineResult,
    RebalanceBacktest, TradeEvaluator, TradeOutcome,
};
pub use config::{ConfigError, Credentials, ProviderEndpoints};
pub use data::{ConstituentChange, MarketData, OptionType, ProviderClient, ProviderError, TradeRecord};
pub use metrics::{MetricsCalculator, PerformanceMetrics};
pub use report::{CurveReporter, NoopReporter, ReportError, SvgChartReporter};
