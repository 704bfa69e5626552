//! Core data types for the rebalancing backtest.
//!
//! These mirror the shapes returned by the constituent-change and market
//! data providers, after normalization into dates and decimals.

use std::fmt;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Calendar days between a change being announced and taking effect.
pub const ANNOUNCEMENT_LEAD_DAYS: i64 = 5;

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    /// Lowercase name as used in provider query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an index membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
}

impl ChangeType {
    /// Option side traded for this kind of change.
    pub fn option_type(&self) -> OptionType {
        match self {
            Self::Added => OptionType::Call,
            Self::Removed => OptionType::Put,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "additions",
            Self::Removed => "deletions",
        }
    }
}

/// One row of the historical constituent feed, after normalization.
///
/// A row can describe an addition, a removal, or both at once (one company
/// replacing another). `None` stands for the provider's empty / "N/A" field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentChange {
    pub date: NaiveDate,
    pub symbol: String,
    pub added_security: Option<String>,
    pub removed_ticker: Option<String>,
    pub removed_security: Option<String>,
    pub reason: String,
}

/// A single addition or removal that the backtest trades around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentChangeEvent {
    /// Date the change takes effect in the index
    pub effective_date: NaiveDate,

    /// Ticker being added or removed
    pub symbol: String,

    pub change_type: ChangeType,

    /// Company name, when the feed provides one
    pub security: Option<String>,

    pub reason: String,
}

impl ConstituentChangeEvent {
    pub fn announcement_date(&self) -> NaiveDate {
        self.effective_date - Duration::days(ANNOUNCEMENT_LEAD_DAYS)
    }
}

/// Daily bar for an underlying or an option contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Exchange-local trading date
    pub date: NaiveDate,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub volume: Option<f64>,
}

impl PriceBar {
    pub fn new(date: NaiveDate, open: Decimal, close: Decimal) -> Self {
        Self {
            date,
            open,
            close,
            high: None,
            low: None,
            volume: None,
        }
    }
}

/// A listed option contract as of some reference date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Provider contract symbol (e.g. "O:ABC230317C00050000")
    pub contract_symbol: String,
    pub underlying: String,
    pub expiration_date: NaiveDate,
    pub strike_price: Decimal,
    pub contract_type: OptionType,
}

/// Hypothetical round trip in one option contract around one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Effective date of the triggering event
    pub effective_date: NaiveDate,

    /// Open of the first bar in the contract's window (entry)
    pub open_price: Decimal,

    /// Close of the last bar in the contract's window (exit)
    pub last_price: Decimal,

    /// Underlying ticker
    pub ticker: String,

    pub reason: String,

    pub contract_symbol: String,
    pub strike_price: Decimal,
    pub expiration_date: NaiveDate,

    /// Underlying open used to pick the strike
    pub effective_price: Decimal,

    /// Sum of daily close-to-close returns of the underlying over the window
    pub underlying_return: f64,
}

impl TradeRecord {
    /// Per-share PnL of the round trip.
    pub fn gross_pnl(&self) -> Decimal {
        self.last_price - self.open_price
    }
}
