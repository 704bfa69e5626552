//! Per-event trade evaluation.
//!
//! For one rebalancing event:
//! 1. Fetch underlying bars from the announcement date for a fixed window
//! 2. Take the first open as the reference price
//! 3. Pick the first expiration at least N days after the effective date
//! 4. Pick the strike nearest the reference price on that expiration
//! 5. Price the contract from its first open to its last close
//!
//! Any missing or failed step skips the event; nothing here aborts a batch.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::{
    ConstituentChangeEvent, MarketData, OptionContract, OptionType, PriceBar, ProviderError,
    TradeRecord,
};

/// Date windows used when evaluating an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Calendar days of underlying bars fetched after the announcement date.
    pub underlying_window_days: i64,

    /// Minimum calendar days between the effective date and expiration.
    pub min_days_after_effective: i64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            underlying_window_days: 30,
            min_days_after_effective: 25,
        }
    }
}

/// Broad class of a skip, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipKind {
    /// A provider request failed or returned something unparseable
    ProviderError,
    /// A request succeeded but had nothing usable in it
    DataAbsent,
}

/// Why an event produced no trade.
#[derive(Error, Debug)]
pub enum SkipReason {
    #[error("underlying bars unavailable: {0}")]
    UnderlyingFetch(#[source] ProviderError),

    #[error("no underlying bars between {start} and {end}")]
    NoUnderlyingBars { start: NaiveDate, end: NaiveDate },

    #[error("options chain unavailable: {0}")]
    ChainFetch(#[source] ProviderError),

    #[error("no {option_type} expiration on or after {threshold}")]
    NoExpiration {
        option_type: OptionType,
        threshold: NaiveDate,
    },

    #[error("option bars unavailable for {contract}: {source}")]
    OptionFetch {
        contract: String,
        #[source]
        source: ProviderError,
    },

    #[error("no bars for {contract} between {start} and {end}")]
    NoOptionBars {
        contract: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl SkipReason {
    pub fn kind(&self) -> SkipKind {
        match self {
            Self::UnderlyingFetch(_) | Self::ChainFetch(_) | Self::OptionFetch { .. } => {
                SkipKind::ProviderError
            }
            Self::NoUnderlyingBars { .. } | Self::NoExpiration { .. } | Self::NoOptionBars { .. } => {
                SkipKind::DataAbsent
            }
        }
    }
}

/// An event that was evaluated but not traded.
#[derive(Debug)]
pub struct SkippedEvent {
    pub ticker: String,
    pub effective_date: NaiveDate,
    pub reason: SkipReason,
}

/// Result of evaluating one event.
#[derive(Debug)]
pub enum TradeOutcome {
    Filled(TradeRecord),
    Skipped(SkippedEvent),
}

impl TradeOutcome {
    pub fn trade(&self) -> Option<&TradeRecord> {
        match self {
            Self::Filled(record) => Some(record),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled(_))
    }
}

/// Smallest expiration in `chain` on or after `threshold`.
pub fn select_expiration(chain: &[OptionContract], threshold: NaiveDate) -> Option<NaiveDate> {
    chain
        .iter()
        .map(|c| c.expiration_date)
        .filter(|expiration| *expiration >= threshold)
        .min()
}

/// Contract on `expiration` whose strike is nearest `reference_price`.
///
/// Ties go to the contract listed first.
pub fn select_nearest_strike(
    chain: &[OptionContract],
    expiration: NaiveDate,
    reference_price: Decimal,
) -> Option<&OptionContract> {
    let mut best: Option<(&OptionContract, Decimal)> = None;

    for contract in chain.iter().filter(|c| c.expiration_date == expiration) {
        let distance = (contract.strike_price - reference_price).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((contract, distance)),
        }
    }

    best.map(|(contract, _)| contract)
}

/// Sum of daily close-to-close returns, first day counted as zero.
pub fn cumulative_return(bars: &[PriceBar]) -> f64 {
    bars.windows(2)
        .map(|w| {
            let prev: f64 = w[0].close.try_into().unwrap_or(0.0);
            let curr: f64 = w[1].close.try_into().unwrap_or(0.0);
            if prev == 0.0 {
                0.0
            } else {
                (curr - prev) / prev
            }
        })
        .sum()
}

/// Evaluates rebalancing events into hypothetical option trades.
#[derive(Debug, Clone, Default)]
pub struct TradeEvaluator {
    config: EvaluatorConfig,
}

impl TradeEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Evaluate one event. Failures are logged and returned as a skip.
    pub async fn evaluate<M: MarketData + ?Sized>(
        &self,
        provider: &mut M,
        event: &ConstituentChangeEvent,
        option_type: OptionType,
    ) -> TradeOutcome {
        match self.try_evaluate(provider, event, option_type).await {
            Ok(record) => {
                debug!(
                    ticker = %record.ticker,
                    contract = %record.contract_symbol,
                    open = %record.open_price,
                    last = %record.last_price,
                    "evaluated trade"
                );
                TradeOutcome::Filled(record)
            }
            Err(reason) => {
                warn!(
                    ticker = %event.symbol,
                    effective_date = %event.effective_date,
                    kind = ?reason.kind(),
                    "skipping event: {}",
                    reason
                );
                TradeOutcome::Skipped(SkippedEvent {
                    ticker: event.symbol.clone(),
                    effective_date: event.effective_date,
                    reason,
                })
            }
        }
    }

    async fn try_evaluate<M: MarketData + ?Sized>(
        &self,
        provider: &mut M,
        event: &ConstituentChangeEvent,
        option_type: OptionType,
    ) -> Result<TradeRecord, SkipReason> {
        let start_date = event.announcement_date();
        let window_end = start_date + Duration::days(self.config.underlying_window_days);
        let ticker = event.symbol.as_str();

        let underlying = provider
            .daily_bars(ticker, start_date, window_end)
            .await
            .map_err(SkipReason::UnderlyingFetch)?;

        let effective_price = underlying
            .first()
            .map(|bar| bar.open)
            .ok_or(SkipReason::NoUnderlyingBars {
                start: start_date,
                end: window_end,
            })?;

        let chain = provider
            .options_chain(ticker, option_type, start_date)
            .await
            .map_err(SkipReason::ChainFetch)?;

        let threshold = event.effective_date + Duration::days(self.config.min_days_after_effective);
        let expiration = select_expiration(&chain, threshold).ok_or(SkipReason::NoExpiration {
            option_type,
            threshold,
        })?;

        // A chosen expiration always has at least one contract on it
        let contract = select_nearest_strike(&chain, expiration, effective_price).ok_or(
            SkipReason::NoExpiration {
                option_type,
                threshold,
            },
        )?;

        let option_bars = provider
            .option_bars(&contract.contract_symbol, start_date, expiration)
            .await
            .map_err(|source| SkipReason::OptionFetch {
                contract: contract.contract_symbol.clone(),
                source,
            })?;

        let (first, last) = match (option_bars.first(), option_bars.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(SkipReason::NoOptionBars {
                    contract: contract.contract_symbol.clone(),
                    start: start_date,
                    end: expiration,
                })
            }
        };

        Ok(TradeRecord {
            effective_date: event.effective_date,
            open_price: first.open,
            last_price: last.close,
            ticker: ticker.to_string(),
            reason: event.reason.clone(),
            contract_symbol: contract.contract_symbol.clone(),
            strike_price: contract.strike_price,
            expiration_date: expiration,
            effective_price,
            underlying_return: cumulative_return(&underlying),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use crate::data::ChangeType;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// In-memory market data keyed by symbol.
    #[derive(Default)]
    pub(crate) struct FakeMarket {
        pub bars: HashMap<String, Vec<PriceBar>>,
        pub chains: HashMap<String, Vec<OptionContract>>,
        pub failing: Vec<String>,
        pub requests: Vec<(String, NaiveDate, NaiveDate)>,
        pub chain_requests: Vec<(String, OptionType, NaiveDate)>,
    }

    impl FakeMarket {
        pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
            self.bars.insert(symbol.to_string(), bars);
            self
        }

        pub fn with_chain(mut self, underlying: &str, chain: Vec<OptionContract>) -> Self {
            self.chains.insert(underlying.to_string(), chain);
            self
        }

        pub fn failing(mut self, symbol: &str) -> Self {
            self.failing.push(symbol.to_string());
            self
        }
    }

    #[async_trait]
    impl MarketData for FakeMarket {
        async fn daily_bars(
            &mut self,
            ticker: &str,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> Result<Vec<PriceBar>, ProviderError> {
            self.requests.push((ticker.to_string(), start_date, end_date));
            if self.failing.iter().any(|s| s == ticker) {
                return Err(ProviderError::ApiError {
                    status: 500,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.bars.get(ticker).cloned().unwrap_or_default())
        }

        async fn options_chain(
            &mut self,
            underlying: &str,
            option_type: OptionType,
            as_of: NaiveDate,
        ) -> Result<Vec<OptionContract>, ProviderError> {
            self.chain_requests
                .push((underlying.to_string(), option_type, as_of));
            Ok(self.chains.get(underlying).cloned().unwrap_or_default())
        }
    }

    pub(crate) fn contract(symbol: &str, expiration: NaiveDate, strike: Decimal) -> OptionContract {
        OptionContract {
            contract_symbol: symbol.to_string(),
            underlying: "ABC".to_string(),
            expiration_date: expiration,
            strike_price: strike,
            contract_type: OptionType::Put,
        }
    }

    pub(crate) fn call(symbol: &str, expiration: NaiveDate, strike: Decimal) -> OptionContract {
        OptionContract {
            contract_type: OptionType::Call,
            ..contract(symbol, expiration, strike)
        }
    }

    pub(crate) fn event(symbol: &str, effective: NaiveDate) -> ConstituentChangeEvent {
        ConstituentChangeEvent {
            effective_date: effective,
            symbol: symbol.to_string(),
            change_type: ChangeType::Removed,
            security: None,
            reason: "acquired".to_string(),
        }
    }

    /// Market where ABC (effective 2023-02-01) has a tradable put.
    pub(crate) fn abc_market() -> FakeMarket {
        FakeMarket::default()
            .with_bars(
                "ABC",
                vec![
                    PriceBar::new(date(2023, 1, 27), dec!(49.60), dec!(50.00)),
                    PriceBar::new(date(2023, 1, 30), dec!(50.00), dec!(55.00)),
                ],
            )
            .with_chain(
                "ABC",
                vec![
                    contract("O:ABC230217P00050000", date(2023, 2, 17), dec!(50)),
                    contract("O:ABC230317P00045000", date(2023, 3, 17), dec!(45)),
                    contract("O:ABC230317P00050000", date(2023, 3, 17), dec!(50)),
                    contract("O:ABC230421P00050000", date(2023, 4, 21), dec!(50)),
                ],
            )
            .with_bars(
                "O:ABC230317P00050000",
                vec![
                    PriceBar::new(date(2023, 1, 27), dec!(2.00), dec!(2.10)),
                    PriceBar::new(date(2023, 2, 15), dec!(3.00), dec!(4.00)),
                    PriceBar::new(date(2023, 3, 17), dec!(4.50), dec!(5.00)),
                ],
            )
    }

    #[tokio::test]
    async fn test_evaluates_trade_end_to_end() {
        let mut market = abc_market();
        let evaluator = TradeEvaluator::default();

        let outcome = evaluator
            .evaluate(&mut market, &event("ABC", date(2023, 2, 1)), OptionType::Put)
            .await;

        let record = outcome.trade().expect("trade should fill");
        assert_eq!(record.effective_date, date(2023, 2, 1));
        assert_eq!(record.contract_symbol, "O:ABC230317P00050000");
        assert_eq!(record.expiration_date, date(2023, 3, 17));
        assert_eq!(record.effective_price, dec!(49.60));
        assert_eq!(record.open_price, dec!(2.00));
        assert_eq!(record.last_price, dec!(5.00));
        assert_eq!(record.gross_pnl(), dec!(3.00));
        assert!((record.underlying_return - 0.1).abs() < 1e-9);

        // Underlying window is announcement date + 30 days; option window ends at expiration
        assert_eq!(
            market.requests[0],
            ("ABC".to_string(), date(2023, 1, 27), date(2023, 2, 26))
        );
        assert_eq!(
            market.requests[1],
            ("O:ABC230317P00050000".to_string(), date(2023, 1, 27), date(2023, 3, 17))
        );

        // Chain is listed as of the announcement date, for the requested side
        assert_eq!(
            market.chain_requests,
            vec![("ABC".to_string(), OptionType::Put, date(2023, 1, 27))]
        );
    }

    #[tokio::test]
    async fn test_addition_fills_call() {
        let mut market = FakeMarket::default()
            .with_bars(
                "NEW",
                vec![PriceBar::new(date(2023, 3, 13), dec!(99.00), dec!(101.00))],
            )
            .with_chain(
                "NEW",
                vec![
                    call("O:NEW230421C00100000", date(2023, 4, 21), dec!(100)),
                    call("O:NEW230421C00105000", date(2023, 4, 21), dec!(105)),
                ],
            )
            .with_bars(
                "O:NEW230421C00100000",
                vec![
                    PriceBar::new(date(2023, 3, 13), dec!(3.20), dec!(3.50)),
                    PriceBar::new(date(2023, 4, 20), dec!(1.10), dec!(0.80)),
                ],
            );
        let addition = ConstituentChangeEvent {
            change_type: ChangeType::Added,
            ..event("NEW", date(2023, 3, 18))
        };

        let outcome = TradeEvaluator::default()
            .evaluate(&mut market, &addition, OptionType::Call)
            .await;

        let record = outcome.trade().expect("call should fill");
        assert_eq!(record.contract_symbol, "O:NEW230421C00100000");
        assert_eq!(record.gross_pnl(), dec!(-2.40));
        assert_eq!(
            market.chain_requests,
            vec![("NEW".to_string(), OptionType::Call, date(2023, 3, 13))]
        );
    }

    #[tokio::test]
    async fn test_empty_underlying_bars_skip() {
        let mut market = abc_market().with_bars("ABC", vec![]);
        let outcome = TradeEvaluator::default()
            .evaluate(&mut market, &event("ABC", date(2023, 2, 1)), OptionType::Put)
            .await;

        match outcome {
            TradeOutcome::Skipped(skip) => {
                assert_eq!(skip.ticker, "ABC");
                assert_eq!(skip.reason.kind(), SkipKind::DataAbsent);
                assert!(matches!(skip.reason, SkipReason::NoUnderlyingBars { .. }));
            }
            TradeOutcome::Filled(_) => panic!("expected skip"),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_skips() {
        let mut market = abc_market().failing("ABC");
        let outcome = TradeEvaluator::default()
            .evaluate(&mut market, &event("ABC", date(2023, 2, 1)), OptionType::Put)
            .await;

        match outcome {
            TradeOutcome::Skipped(skip) => {
                assert_eq!(skip.reason.kind(), SkipKind::ProviderError);
            }
            TradeOutcome::Filled(_) => panic!("expected skip"),
        }
    }

    #[tokio::test]
    async fn test_no_expiration_after_buffer_skips() {
        let mut market = abc_market().with_chain(
            "ABC",
            vec![contract("O:ABC230217P00050000", date(2023, 2, 17), dec!(50))],
        );
        let outcome = TradeEvaluator::default()
            .evaluate(&mut market, &event("ABC", date(2023, 2, 1)), OptionType::Put)
            .await;

        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkippedEvent {
                reason: SkipReason::NoExpiration { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_option_bars_skip() {
        let mut market = abc_market().with_bars("O:ABC230317P00050000", vec![]);
        let outcome = TradeEvaluator::default()
            .evaluate(&mut market, &event("ABC", date(2023, 2, 1)), OptionType::Put)
            .await;

        assert!(matches!(
            outcome,
            TradeOutcome::Skipped(SkippedEvent {
                reason: SkipReason::NoOptionBars { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_select_expiration_is_minimal_on_or_after_threshold() {
        let chain = vec![
            contract("a", date(2023, 4, 21), dec!(50)),
            contract("b", date(2023, 2, 26), dec!(50)),
            contract("c", date(2023, 2, 24), dec!(50)),
            contract("d", date(2023, 3, 17), dec!(50)),
        ];

        // Boundary is inclusive
        assert_eq!(select_expiration(&chain, date(2023, 2, 26)), Some(date(2023, 2, 26)));
        assert_eq!(select_expiration(&chain, date(2023, 2, 27)), Some(date(2023, 3, 17)));
        assert_eq!(select_expiration(&chain, date(2023, 5, 1)), None);
        assert_eq!(select_expiration(&[], date(2023, 5, 1)), None);
    }

    #[test]
    fn test_select_nearest_strike() {
        let expiration = date(2023, 3, 17);
        let chain = vec![
            contract("far", expiration, dec!(40)),
            contract("other-expiry", date(2023, 4, 21), dec!(50)),
            contract("near", expiration, dec!(48)),
            contract("mid", expiration, dec!(55)),
        ];

        let chosen = select_nearest_strike(&chain, expiration, dec!(50)).unwrap();
        assert_eq!(chosen.contract_symbol, "near");

        for candidate in chain.iter().filter(|c| c.expiration_date == expiration) {
            assert!((chosen.strike_price - dec!(50)).abs() <= (candidate.strike_price - dec!(50)).abs());
        }
    }

    #[test]
    fn test_strike_ties_go_to_first_listed() {
        let expiration = date(2023, 3, 17);
        let chain = vec![
            contract("below", expiration, dec!(47.5)),
            contract("above", expiration, dec!(52.5)),
        ];

        let chosen = select_nearest_strike(&chain, expiration, dec!(50)).unwrap();
        assert_eq!(chosen.contract_symbol, "below");

        let reversed: Vec<_> = chain.into_iter().rev().collect();
        let chosen = select_nearest_strike(&reversed, expiration, dec!(50)).unwrap();
        assert_eq!(chosen.contract_symbol, "above");
    }

    #[test]
    fn test_cumulative_return() {
        let bars = vec![
            PriceBar::new(date(2023, 1, 2), dec!(10), dec!(10)),
            PriceBar::new(date(2023, 1, 3), dec!(10), dec!(11)),
            PriceBar::new(date(2023, 1, 4), dec!(11), dec!(9.9)),
        ];
        assert!((cumulative_return(&bars) - 0.0).abs() < 1e-9);
        assert_eq!(cumulative_return(&bars[..1]), 0.0);
    }
}
