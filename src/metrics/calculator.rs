//! Performance metrics calculator.
//!
//! Summarizes a pipeline's trade ledger and capital curve.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{Aggregate, CapitalPoint};

/// Performance metrics for one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Basic statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub skipped_events: usize,
    pub excluded_trades: usize,

    // P&L metrics (dollars, after the contract multiplier)
    pub total_pnl: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: f64,
    pub avg_trade_pnl: Decimal,
    pub largest_winner: Decimal,
    pub largest_loser: Decimal,

    // Return metrics
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub total_return_pct: f64,

    // Risk metrics
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    pub max_drawdown_date: Option<NaiveDate>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            skipped_events: 0,
            excluded_trades: 0,
            total_pnl: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: 0.0,
            avg_trade_pnl: Decimal::ZERO,
            largest_winner: Decimal::ZERO,
            largest_loser: Decimal::ZERO,
            initial_capital: Decimal::ZERO,
            final_capital: Decimal::ZERO,
            total_return_pct: 0.0,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: 0.0,
            max_drawdown_date: None,
        }
    }
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Trades: {} (W: {}, L: {}), skipped events: {}, excluded: {}\n\
             Win Rate: {:.1}%\n\
             Profit Factor: {:.2}\n\
             \n\
             Total P&L: ${:.2}\n\
             Avg Trade: ${:.2}\n\
             Largest Win: ${:.2}\n\
             Largest Loss: ${:.2}\n\
             \n\
             Capital: ${:.2} -> ${:.2} ({:.2}%)\n\
             Max Drawdown: ${:.2} ({:.2}%)",
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.skipped_events,
            self.excluded_trades,
            self.win_rate * 100.0,
            self.profit_factor,
            self.total_pnl,
            self.avg_trade_pnl,
            self.largest_winner,
            self.largest_loser,
            self.initial_capital,
            self.final_capital,
            self.total_return_pct,
            self.max_drawdown,
            self.max_drawdown_pct,
        )
    }
}

/// Drawdown of a capital curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    pub max_drawdown_date: Option<NaiveDate>,
    pub peak_date: Option<NaiveDate>,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from an aggregated pipeline.
    pub fn calculate(aggregate: &Aggregate) -> PerformanceMetrics {
        let multiplier = aggregate.contract_multiplier;
        let pnls: Vec<Decimal> = aggregate.rows.iter().map(|r| r.gross_pnl * multiplier).collect();

        let total_trades = pnls.len();
        let winning_trades = pnls.iter().filter(|p| **p > Decimal::ZERO).count();
        let losing_trades = total_trades - winning_trades;
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let total_pnl: Decimal = pnls.iter().sum();
        let gross_profit: Decimal = pnls.iter().filter(|p| **p > Decimal::ZERO).sum();
        let gross_loss: Decimal = pnls.iter().filter(|p| **p <= Decimal::ZERO).sum();

        let avg_trade_pnl = if total_trades > 0 {
            total_pnl / Decimal::from(total_trades as i64)
        } else {
            Decimal::ZERO
        };

        let largest_winner = pnls
            .iter()
            .copied()
            .filter(|p| *p > Decimal::ZERO)
            .max()
            .unwrap_or(Decimal::ZERO);
        let largest_loser = pnls
            .iter()
            .copied()
            .filter(|p| *p <= Decimal::ZERO)
            .min()
            .unwrap_or(Decimal::ZERO);

        let initial_capital = aggregate.initial_capital;
        let final_capital = aggregate.final_capital();
        let total_return_pct = Self::return_pct(initial_capital, final_capital);

        let drawdown = Self::analyze_drawdown(initial_capital, &aggregate.capital_curve());

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            skipped_events: aggregate.skipped.len(),
            excluded_trades: aggregate.excluded.len(),
            total_pnl,
            gross_profit,
            gross_loss,
            profit_factor: Self::calculate_profit_factor(gross_profit, gross_loss),
            avg_trade_pnl,
            largest_winner,
            largest_loser,
            initial_capital,
            final_capital,
            total_return_pct,
            max_drawdown: drawdown.max_drawdown,
            max_drawdown_pct: drawdown.max_drawdown_pct,
            max_drawdown_date: drawdown.max_drawdown_date,
        }
    }

    /// Calculate profit factor.
    fn calculate_profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> f64 {
        let loss: f64 = gross_loss.abs().try_into().unwrap_or(0.0);
        if loss == 0.0 {
            return f64::INFINITY;
        }
        let profit: f64 = gross_profit.try_into().unwrap_or(0.0);
        profit / loss
    }

    fn return_pct(initial: Decimal, final_val: Decimal) -> f64 {
        let init: f64 = initial.try_into().unwrap_or(0.0);
        let fin: f64 = final_val.try_into().unwrap_or(0.0);
        if init == 0.0 {
            return 0.0;
        }
        (fin - init) / init * 100.0
    }

    /// Largest peak-to-trough decline, with the starting capital as the first peak.
    fn analyze_drawdown(initial_capital: Decimal, curve: &[CapitalPoint]) -> DrawdownAnalysis {
        let mut peak = initial_capital;
        let mut peak_date = None;
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_pct = 0.0;
        let mut max_drawdown_date = None;

        for point in curve {
            if point.capital > peak {
                peak = point.capital;
                peak_date = Some(point.effective_date);
                continue;
            }

            let drawdown = peak - point.capital;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                max_drawdown_date = Some(point.effective_date);
                max_drawdown_pct = if peak > Decimal::ZERO {
                    let dd: f64 = drawdown.try_into().unwrap_or(0.0);
                    let pk: f64 = peak.try_into().unwrap_or(1.0);
                    dd / pk * 100.0
                } else {
                    0.0
                };
            }
        }

        DrawdownAnalysis {
            max_drawdown,
            max_drawdown_pct,
            max_drawdown_date,
            peak_date,
        }
    }
}
