//! Turns per-event outcomes into a dated trade ledger and capital curve.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::TradeRecord;

use super::evaluator::{SkippedEvent, TradeOutcome};

/// Capital and sizing used to build the curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Starting account value.
    pub initial_capital: Decimal,

    /// Shares per option contract.
    pub contract_multiplier: Decimal,

    /// Tickers dropped from the ledger regardless of outcome.
    #[serde(default)]
    pub excluded_tickers: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(1000),
            contract_multiplier: Decimal::from(100),
            excluded_tickers: Vec::new(),
        }
    }
}

/// One ledger row: a trade plus its running capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(flatten)]
    pub trade: TradeRecord,
    pub gross_pnl: Decimal,
    pub capital: Decimal,
}

/// Point on the capital curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalPoint {
    pub effective_date: NaiveDate,
    pub capital: Decimal,
}

/// Aggregated result of one pipeline.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Ledger sorted by effective date
    pub rows: Vec<LedgerRow>,

    /// Events that produced no trade, in evaluation order
    pub skipped: Vec<SkippedEvent>,

    /// Trades removed by the exclusion list
    pub excluded: Vec<TradeRecord>,

    pub initial_capital: Decimal,
    pub contract_multiplier: Decimal,
}

impl Aggregate {
    pub fn capital_curve(&self) -> Vec<CapitalPoint> {
        self.rows
            .iter()
            .map(|row| CapitalPoint {
                effective_date: row.trade.effective_date,
                capital: row.capital,
            })
            .collect()
    }

    pub fn trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.rows.iter().map(|row| &row.trade)
    }

    pub fn final_capital(&self) -> Decimal {
        self.rows
            .last()
            .map(|row| row.capital)
            .unwrap_or(self.initial_capital)
    }
}

/// Running capital for `trades` taken in the given order.
pub fn running_capital(trades: &[TradeRecord], initial_capital: Decimal, multiplier: Decimal) -> Vec<Decimal> {
    let mut cumulative = Decimal::ZERO;
    trades
        .iter()
        .map(|trade| {
            cumulative += trade.gross_pnl();
            initial_capital + cumulative * multiplier
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    fn is_excluded(&self, ticker: &str) -> bool {
        self.config
            .excluded_tickers
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(ticker))
    }

    /// Build the ledger from outcomes in evaluation order.
    ///
    /// Trades are sorted by effective date; the sort is stable so trades on
    /// the same date keep their evaluation order.
    pub fn aggregate(&self, outcomes: Vec<TradeOutcome>) -> Aggregate {
        let mut trades = Vec::new();
        let mut skipped = Vec::new();

        for outcome in outcomes {
            match outcome {
                TradeOutcome::Filled(trade) => trades.push(trade),
                TradeOutcome::Skipped(skip) => skipped.push(skip),
            }
        }

        trades.sort_by_key(|trade| trade.effective_date);

        let (excluded, trades): (Vec<_>, Vec<_>) =
            trades.into_iter().partition(|trade| self.is_excluded(&trade.ticker));

        for trade in &excluded {
            info!(ticker = %trade.ticker, effective_date = %trade.effective_date, "excluded trade");
        }

        let capital = running_capital(
            &trades,
            self.config.initial_capital,
            self.config.contract_multiplier,
        );

        let rows = trades
            .into_iter()
            .zip(capital)
            .map(|(trade, capital)| LedgerRow {
                gross_pnl: trade.gross_pnl(),
                trade,
                capital,
            })
            .collect();

        Aggregate {
            rows,
            skipped,
            excluded,
            initial_capital: self.config.initial_capital,
            contract_multiplier: self.config.contract_multiplier,
        }
    }
}
