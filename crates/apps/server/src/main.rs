mod app;
mod config;
mod upstreams;

use std::sync::Arc;
use std::time::Duration;

use catalog::Catalog;
use compute::Aggregator;
use providers::{HttpSeriesClient, ProxyRegionalClient, SeriesClientConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app::{router, AppState};
use crate::config::Config;
use crate::upstreams::{UpstreamBases, UpstreamTable};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let catalog = Arc::new(Catalog::builtin()?);

    let series = HttpSeriesClient::new(SeriesClientConfig {
        base_url: config.series_base_url.clone(),
        api_key: config.series_api_key.clone(),
        request_timeout: config.source_timeout + Duration::from_secs(2),
        cache_ttl: config.series_cache_ttl,
    })?;
    let regional = ProxyRegionalClient::new(config.proxy_url.clone(), config.source_timeout)?;
    if !regional.is_configured() {
        info!("PROXY_URL not set; regional sources will report no data");
    }

    let aggregator = Aggregator::new(catalog.clone(), Arc::new(series), Arc::new(regional))
        .with_source_timeout(config.source_timeout);

    let state = AppState {
        catalog,
        aggregator: Arc::new(aggregator),
        upstreams: Arc::new(UpstreamTable::new(&config.keys, &UpstreamBases::default())),
        http: reqwest::Client::builder()
            .timeout(config.source_timeout)
            .build()?,
    };

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("atlas server listening on http://{}", config.addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
