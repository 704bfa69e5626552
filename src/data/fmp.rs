//! FinancialModelingPrep historical S&P 500 constituent feed.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use super::error::ProviderError;
use super::types::ConstituentChange;

/// FMP API base URL.
pub const BASE_URL: &str = "https://financialmodelingprep.com";

/// Placeholder the feed uses (or we substitute) for an empty field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Raw row from `/api/v3/historical/sp500_constituent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConstituentRecord {
    pub date: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub added_security: Option<String>,
    #[serde(default)]
    pub removed_ticker: Option<String>,
    #[serde(default)]
    pub removed_security: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl RawConstituentRecord {
    /// Normalize into a [`ConstituentChange`]; `None` if the date is unusable.
    pub fn to_change(&self) -> Option<ConstituentChange> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()?;

        Some(ConstituentChange {
            date,
            symbol: self.symbol.as_deref().unwrap_or_default().trim().to_string(),
            added_security: normalize_field(self.added_security.as_deref()),
            removed_ticker: normalize_field(self.removed_ticker.as_deref()),
            removed_security: normalize_field(self.removed_security.as_deref()),
            reason: self.reason.as_deref().unwrap_or_default().trim().to_string(),
        })
    }
}

/// Empty strings and the "N/A" placeholder both mean the field is absent.
pub fn normalize_field(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || value == NOT_AVAILABLE {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn constituent_changes_url(base_url: &str, api_key: &str) -> String {
    format!(
        "{}/api/v3/historical/sp500_constituent?apikey={}",
        base_url, api_key
    )
}

/// Parse the feed body, dropping rows whose date cannot be read.
pub fn parse_constituent_changes(body: &str) -> Result<Vec<ConstituentChange>, ProviderError> {
    let records: Vec<RawConstituentRecord> = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("Failed to parse constituent feed: {}", e))
    })?;

    let mut changes = Vec::with_capacity(records.len());
    for record in &records {
        match record.to_change() {
            Some(change) => changes.push(change),
            None => warn!(date = %record.date, "skipping constituent row with bad date"),
        }
    }

    Ok(changes)
}
