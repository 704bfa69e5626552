pub mod cache;
pub mod client;
pub mod error;
pub mod fmp;
pub mod polygon;
pub mod types;

pub use cache::{CacheStats, HttpFetcher, ReqwestFetcher, ResponseCache};
pub use client::{MarketData, ProviderClient};
pub use error::ProviderError;
pub use types::{
    ChangeType, ConstituentChange, ConstituentChangeEvent, OptionContract, OptionType, PriceBar,
    TradeRecord,
};
