use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::BoxFuture;
use crate::cache::{CacheKey, SeriesCache};
use crate::error::ProviderError;
use crate::protocol::SeriesResponse;

pub const DEFAULT_SERIES_BASE_URL: &str = "https://api.datacommons.org/v1/observations/series";

/// Generic time-series provider.
///
/// Transport failures and non-2xx responses are reported as an empty series,
/// never as an error. `Err` is reserved for a successful response whose body
/// cannot be decoded.
pub trait SeriesProvider: Send + Sync {
    fn fetch_series<'a>(
        &'a self,
        entity: &'a str,
        variable: &'a str,
    ) -> BoxFuture<'a, Result<SeriesResponse, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct SeriesClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub cache_ttl: Option<Duration>,
}

impl Default for SeriesClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERIES_BASE_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(10),
            cache_ttl: None,
        }
    }
}

/// HTTP series client: `GET {base}/{entity}/{variable}?key={api_key}`.
pub struct HttpSeriesClient {
    config: SeriesClientConfig,
    client: reqwest::Client,
    cache: SeriesCache,
}

impl HttpSeriesClient {
    pub fn new(config: SeriesClientConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ProviderError::Client)?;
        Ok(Self {
            cache: SeriesCache::with_ttl(config.cache_ttl),
            config,
            client,
        })
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    fn series_url(&self, entity: &str, variable: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            entity.trim_matches('/'),
            variable
        )
    }

    async fn fetch_uncached(
        &self,
        entity: &str,
        variable: &str,
    ) -> Result<Option<SeriesResponse>, ProviderError> {
        let url = self.series_url(entity, variable);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            req = req.query(&[("key", key.as_str())]);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%entity, %variable, "series request failed: {e}");
                return Ok(None);
            }
        };

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%entity, %variable, "series not found");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(%entity, %variable, "series request returned HTTP {status}");
            return Ok(None);
        }

        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(%entity, %variable, "series body read failed: {e}");
                return Ok(None);
            }
        };

        let parsed: SeriesResponse =
            serde_json::from_slice(&bytes).map_err(|e| ProviderError::Malformed {
                url,
                message: e.to_string(),
            })?;
        Ok(Some(parsed))
    }
}

impl SeriesProvider for HttpSeriesClient {
    fn fetch_series<'a>(
        &'a self,
        entity: &'a str,
        variable: &'a str,
    ) -> BoxFuture<'a, Result<SeriesResponse, ProviderError>> {
        Box::pin(async move {
            let key = CacheKey::new(entity, variable);
            if let Some(hit) = self.cache.get(&key) {
                debug!(%key, "series cache hit");
                return Ok((*hit).clone());
            }

            match self.fetch_uncached(entity, variable).await? {
                // Failures are not cached so the next trigger retries them.
                None => Ok(SeriesResponse::empty()),
                Some(resp) => Ok((*self.cache.insert(key, resp)).clone()),
            }
        })
    }
}
