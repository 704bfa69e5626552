//! Startup configuration read from the process environment.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{fmp, polygon};

pub const FMP_API_KEY_VAR: &str = "FMP_API_KEY";
pub const POLYGON_API_KEY_VAR: &str = "POLYGON_API_KEY";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(&'static str),

    #[error("{0} contains non-unicode data")]
    NonUnicode(&'static str),

    #[error("{0} must not be empty or whitespace")]
    Empty(&'static str),
}

/// API keys for both data providers.
#[derive(Clone)]
pub struct Credentials {
    pub fmp_api_key: String,
    pub polygon_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("fmp_api_key", &"***")
            .field("polygon_api_key", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name))
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&'static str) -> Result<String, env::VarError>,
    {
        Ok(Self {
            fmp_api_key: required(&lookup, FMP_API_KEY_VAR)?,
            polygon_api_key: required(&lookup, POLYGON_API_KEY_VAR)?,
        })
    }
}

fn required<L>(lookup: &L, name: &'static str) -> Result<String, ConfigError>
where
    L: Fn(&'static str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::Empty(name)),
        Ok(value) => Ok(value.trim().to_string()),
        Err(env::VarError::NotPresent) => Err(ConfigError::MissingVar(name)),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode(name)),
    }
}

/// Base URLs of the two providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    pub fmp_base_url: String,
    pub polygon_base_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            fmp_base_url: fmp::BASE_URL.to_string(),
            polygon_base_url: polygon::BASE_URL.to_string(),
        }
    }
}
