//! Polygon market data: daily aggregates and option contract listings.
//!
//! Aggregate timestamps are epoch milliseconds in UTC marking the start of
//! the session; they are converted to New York time before the trading date
//! is taken.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::error::ProviderError;
use super::types::{OptionContract, OptionType, PriceBar};

/// Polygon API base URL.
pub const BASE_URL: &str = "https://api.polygon.io";

/// Exchange timezone for all bar dates.
pub const EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

/// Maximum rows per aggregates request.
pub const MAX_BARS_PER_REQUEST: usize = 50_000;

/// Maximum contracts per listing page.
pub const MAX_CONTRACTS_PER_PAGE: usize = 1000;

/// Aggregates response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatesResponse {
    #[serde(default)]
    pub results: Vec<RawBar>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AggregatesResponse {
    /// Polygon reports request failures in the body of a 200 response.
    pub fn is_error(&self) -> bool {
        !matches!(self.status.as_deref(), None | Some("OK") | Some("DELAYED"))
    }
}

/// Raw daily aggregate.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBar {
    /// Epoch milliseconds, UTC
    pub t: i64,
    pub o: f64,
    pub c: f64,
    #[serde(default)]
    pub h: Option<f64>,
    #[serde(default)]
    pub l: Option<f64>,
    #[serde(default)]
    pub v: Option<f64>,
}

impl RawBar {
    /// Convert to a [`PriceBar`] dated in exchange-local time.
    pub fn to_bar(&self) -> Option<PriceBar> {
        let date = exchange_date(self.t)?;
        Some(PriceBar {
            date,
            open: Decimal::try_from(self.o).ok()?,
            close: Decimal::try_from(self.c).ok()?,
            high: self.h.and_then(|h| Decimal::try_from(h).ok()),
            low: self.l.and_then(|l| Decimal::try_from(l).ok()),
            volume: self.v,
        })
    }
}

/// Options contracts listing page.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsResponse {
    #[serde(default)]
    pub results: Vec<RawContract>,
    #[serde(default)]
    pub next_url: Option<String>,
}

/// Raw contract reference entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawContract {
    pub ticker: String,
    #[serde(default)]
    pub underlying_ticker: Option<String>,
    pub expiration_date: String,
    pub strike_price: f64,
    #[serde(default)]
    pub contract_type: Option<String>,
}

impl RawContract {
    /// Convert to an [`OptionContract`], falling back to the requested
    /// underlying and type when the listing omits them.
    pub fn to_contract(&self, underlying: &str, option_type: OptionType) -> Option<OptionContract> {
        let expiration_date = NaiveDate::parse_from_str(&self.expiration_date, "%Y-%m-%d").ok()?;
        let contract_type = match self.contract_type.as_deref() {
            Some(raw) => OptionType::from_str(raw)?,
            None => option_type,
        };

        Some(OptionContract {
            contract_symbol: self.ticker.clone(),
            underlying: self
                .underlying_ticker
                .clone()
                .unwrap_or_else(|| underlying.to_string()),
            expiration_date,
            strike_price: Decimal::try_from(self.strike_price).ok()?,
            contract_type,
        })
    }
}

/// Trading date in exchange-local time for an epoch-millisecond timestamp.
pub fn exchange_date(epoch_ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(epoch_ms).map(|dt| dt.with_timezone(&EXCHANGE_TZ).date_naive())
}

pub fn daily_bars_url(
    base_url: &str,
    ticker: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    api_key: &str,
) -> String {
    format!(
        "{}/v2/aggs/ticker/{}/range/1/day/{}/{}?adjusted=true&sort=asc&limit={}&apiKey={}",
        base_url,
        ticker,
        start_date.format("%Y-%m-%d"),
        end_date.format("%Y-%m-%d"),
        MAX_BARS_PER_REQUEST,
        api_key
    )
}

pub fn contracts_url(
    base_url: &str,
    underlying: &str,
    option_type: OptionType,
    as_of: NaiveDate,
    api_key: &str,
) -> String {
    format!(
        "{}/v3/reference/options/contracts?underlying_ticker={}&contract_type={}&as_of={}&expired=false&limit={}&apiKey={}",
        base_url,
        underlying,
        option_type.as_str(),
        as_of.format("%Y-%m-%d"),
        MAX_CONTRACTS_PER_PAGE,
        api_key
    )
}

/// `next_url` links come back without credentials.
pub fn next_page_url(next_url: &str, api_key: &str) -> String {
    let separator = if next_url.contains('?') { '&' } else { '?' };
    format!("{}{}apiKey={}", next_url, separator, api_key)
}

/// Parse an aggregates body into bars in ascending date order.
pub fn parse_bars(body: &str) -> Result<Vec<PriceBar>, ProviderError> {
    let response: AggregatesResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("Failed to parse aggregates: {}", e))
    })?;

    if response.is_error() {
        return Err(ProviderError::ApiError {
            status: 200,
            body: response
                .error
                .or(response.status)
                .unwrap_or_default(),
        });
    }

    let mut bars = response
        .results
        .iter()
        .map(|raw| {
            raw.to_bar().ok_or_else(|| {
                ProviderError::invalid_response(format!("Unusable bar at t={}", raw.t))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

/// Parse one contracts page; returns the contracts and the next page link.
pub fn parse_contracts_page(
    body: &str,
    underlying: &str,
    option_type: OptionType,
) -> Result<(Vec<OptionContract>, Option<String>), ProviderError> {
    let response: ContractsResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("Failed to parse contracts: {}", e))
    })?;

    let contracts = response
        .results
        .iter()
        .map(|raw| {
            raw.to_contract(underlying, option_type).ok_or_else(|| {
                ProviderError::invalid_response(format!("Unusable contract {}", raw.ticker))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((contracts, response.next_url))
}
