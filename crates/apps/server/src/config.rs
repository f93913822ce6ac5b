use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use providers::DEFAULT_SERIES_BASE_URL;

pub const DEFAULT_ADDR: &str = "127.0.0.1:9200";
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 8000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: `{value}`")]
    Invalid { key: &'static str, value: String },
}

/// Keys for the upstreams behind `/api/proxy`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApiKeys {
    pub nps: Option<String>,
    pub fda: Option<String>,
    pub census: Option<String>,
    pub data_gov: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub series_base_url: String,
    pub series_api_key: Option<String>,
    /// Target of the regional client. Unset means regional sources have no data.
    pub proxy_url: Option<String>,
    pub source_timeout: Duration,
    /// Unset means cached series never expire.
    pub series_cache_ttl: Option<Duration>,
    pub keys: ApiKeys,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr_raw = var("ATLAS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "ATLAS_ADDR",
            value: addr_raw.clone(),
        })?;

        let timeout_ms = parse_u64(&var, "SOURCE_TIMEOUT_MS")?.unwrap_or(DEFAULT_SOURCE_TIMEOUT_MS);
        let ttl = parse_u64(&var, "SERIES_CACHE_TTL_SECS")?.map(Duration::from_secs);

        Ok(Self {
            addr,
            series_base_url: var("SERIES_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SERIES_BASE_URL.to_string()),
            series_api_key: var("SERIES_API_KEY"),
            proxy_url: var("PROXY_URL"),
            source_timeout: Duration::from_millis(timeout_ms),
            series_cache_ttl: ttl,
            keys: ApiKeys {
                nps: var("NPS_API_KEY"),
                fda: var("FDA_API_KEY"),
                census: var("CENSUS_API_KEY"),
                data_gov: var("DATA_GOV_API_KEY"),
            },
        })
    }
}

fn parse_u64<F>(var: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value: v })
        })
        .transpose()
}
