//! Provider client combining the constituent feed and market data behind a
//! shared response cache.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::{Credentials, ProviderEndpoints};

use super::cache::{CacheStats, HttpFetcher, ResponseCache};
use super::error::ProviderError;
use super::types::{ConstituentChange, OptionContract, OptionType, PriceBar};
use super::{fmp, polygon};

/// Maximum contract listing pages followed for one chain.
pub const MAX_CHAIN_PAGES: usize = 20;

/// Market data needed to evaluate a single rebalancing trade.
#[async_trait]
pub trait MarketData: Send {
    /// Daily bars for an underlying over `[start_date, end_date]`.
    async fn daily_bars(
        &mut self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError>;

    /// Non-expired contracts of one type listed as of `as_of`, in provider order.
    async fn options_chain(
        &mut self,
        underlying: &str,
        option_type: OptionType,
        as_of: NaiveDate,
    ) -> Result<Vec<OptionContract>, ProviderError>;

    /// Daily bars for a single option contract.
    async fn option_bars(
        &mut self,
        contract_symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        self.daily_bars(contract_symbol, start_date, end_date).await
    }
}

/// Client for both providers. All requests go through one cache.
pub struct ProviderClient<F> {
    cache: ResponseCache<F>,
    credentials: Credentials,
    endpoints: ProviderEndpoints,
}

impl<F: HttpFetcher> ProviderClient<F> {
    pub fn new(cache: ResponseCache<F>, credentials: Credentials, endpoints: ProviderEndpoints) -> Self {
        Self {
            cache,
            credentials,
            endpoints,
        }
    }

    /// Full history of S&P 500 constituent changes, in feed order.
    pub async fn constituent_changes(&mut self) -> Result<Vec<ConstituentChange>, ProviderError> {
        let url = fmp::constituent_changes_url(&self.endpoints.fmp_base_url, &self.credentials.fmp_api_key);
        let body = self.cache.get(&url).await?;
        let changes = fmp::parse_constituent_changes(&body)?;
        info!(rows = changes.len(), "loaded constituent change history");
        Ok(changes)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl<F: HttpFetcher> MarketData for ProviderClient<F> {
    async fn daily_bars(
        &mut self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let url = polygon::daily_bars_url(
            &self.endpoints.polygon_base_url,
            ticker,
            start_date,
            end_date,
            &self.credentials.polygon_api_key,
        );
        let body = self.cache.get(&url).await?;
        let bars = polygon::parse_bars(&body)?;
        debug!(ticker, bars = bars.len(), "fetched daily bars");
        Ok(bars)
    }

    async fn options_chain(
        &mut self,
        underlying: &str,
        option_type: OptionType,
        as_of: NaiveDate,
    ) -> Result<Vec<OptionContract>, ProviderError> {
        let api_key = self.credentials.polygon_api_key.clone();
        let mut url = polygon::contracts_url(
            &self.endpoints.polygon_base_url,
            underlying,
            option_type,
            as_of,
            &api_key,
        );
        let mut chain = Vec::new();

        for page in 0..MAX_CHAIN_PAGES {
            let body = self.cache.get(&url).await?;
            let (contracts, next_url) = polygon::parse_contracts_page(&body, underlying, option_type)?;
            chain.extend(contracts);

            match next_url {
                Some(next) => url = polygon::next_page_url(&next, &api_key),
                None => break,
            }

            if page + 1 == MAX_CHAIN_PAGES {
                warn!(underlying, pages = MAX_CHAIN_PAGES, "chain truncated at page limit");
            }
        }

        debug!(underlying, contracts = chain.len(), "fetched options chain");
        Ok(chain)
    }
}
