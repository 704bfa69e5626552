//! In-memory response cache.
//!
//! Memoizes provider GETs by their exact URL for the lifetime of a run.
//! Historical bars and listings for past dates never change, so entries do
//! not expire; the cache is bounded and evicts the least recently used URL.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::error::ProviderError;

/// Default number of distinct URLs kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs a single GET and returns the response body.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, ProviderError>;
}

/// `reqwest` backed fetcher used against the real providers.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<String, ProviderError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError { status, body });
        }

        Ok(response.text().await?)
    }
}

/// Counters for monitoring cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    body: String,
    last_used: u64,
}

/// Bounded LRU cache in front of an [`HttpFetcher`].
pub struct ResponseCache<F> {
    fetcher: F,
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    clock: u64,
    stats: CacheStats,
}

impl<F: HttpFetcher> ResponseCache<F> {
    pub fn new(fetcher: F, capacity: usize) -> Self {
        Self {
            fetcher,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    /// Return the body for `url`, fetching it on a miss.
    ///
    /// Failed requests are not cached.
    pub async fn get(&mut self, url: &str) -> Result<String, ProviderError> {
        self.clock += 1;

        if let Some(entry) = self.entries.get_mut(url) {
            entry.last_used = self.clock;
            self.stats.hits += 1;
            debug!(url = %redact(url), "cache hit");
            return Ok(entry.body.clone());
        }

        self.stats.misses += 1;
        debug!(url = %redact(url), "cache miss");
        let body = self.fetcher.get(url).await?;

        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                body: body.clone(),
                last_used: self.clock,
            },
        );

        Ok(body)
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(url, _)| url.clone());

        if let Some(url) = oldest {
            self.entries.remove(&url);
            self.stats.evictions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Mask credential query parameters so URLs are safe to log.
pub fn redact(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let params: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("apikey") => format!("{}=***", key),
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", base, params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fetcher that echoes the URL and counts calls.
    #[derive(Clone, Default)]
    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HttpFetcher for CountingFetcher {
        async fn get(&self, url: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("fail") {
                return Err(ProviderError::ApiError {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(format!("body:{}", url))
        }
    }

    #[tokio::test]
    async fn test_identical_request_hits_network_once() {
        let fetcher = CountingFetcher::default();
        let calls = fetcher.calls.clone();
        let mut cache = ResponseCache::new(fetcher, DEFAULT_CACHE_CAPACITY);

        let first = cache.get("https://x/a?apiKey=k").await.unwrap();
        let second = cache.get("https://x/a?apiKey=k").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                evictions: 0
            }
        );
    }

    #[tokio::test]
    async fn test_query_parameters_are_part_of_identity() {
        let fetcher = CountingFetcher::default();
        let calls = fetcher.calls.clone();
        let mut cache = ResponseCache::new(fetcher, DEFAULT_CACHE_CAPACITY);

        cache.get("https://x/a?limit=1").await.unwrap();
        cache.get("https://x/a?limit=2").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let fetcher = CountingFetcher::default();
        let calls = fetcher.calls.clone();
        let mut cache = ResponseCache::new(fetcher, 2);

        cache.get("a").await.unwrap();
        cache.get("b").await.unwrap();
        // Touch "a" so "b" becomes the oldest
        cache.get("a").await.unwrap();
        cache.get("c").await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evictions, 1);

        cache.get("b").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_errors_are_propagated_and_not_cached() {
        let fetcher = CountingFetcher::default();
        let calls = fetcher.calls.clone();
        let mut cache = ResponseCache::new(fetcher, 10);

        assert!(matches!(
            cache.get("https://x/fail").await,
            Err(ProviderError::ApiError { status: 500, .. })
        ));
        assert!(cache.get("https://x/fail").await.is_err());

        assert!(cache.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_redact_masks_api_keys() {
        assert_eq!(
            redact("https://x/a?adjusted=true&apiKey=secret"),
            "https://x/a?adjusted=true&apiKey=***"
        );
        assert_eq!(redact("https://x/b?apikey=secret"), "https://x/b?apikey=***");
        assert_eq!(redact("https://x/c"), "https://x/c");
    }
}
