use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use catalog::{Catalog, FeatureCollection};
use compute::Aggregator;
use foundation::ids::LayerId;
use foundation::time::Year;
use layers::{HeadlessSurface, OverlayPaint, OverlaySynchronizer, SyncReport, ViewState};
use providers::ProxyRequest;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::upstreams::{DispatchError, UpstreamTable};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub aggregator: Arc<Aggregator>,
    pub upstreams: Arc<UpstreamTable>,
    pub http: reqwest::Client,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/proxy", post(proxy))
        .route("/api/layers/data", get(layer_data))
        .route("/api/layers/overlays", get(layer_overlays))
        .route("/api/search", get(search))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

fn query_error(e: QueryRejection) -> Response {
    debug!("bad query: {e}");
    error_response(e.status(), e.body_text())
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn proxy(
    State(state): State<AppState>,
    req: Result<Json<ProxyRequest>, JsonRejection>,
) -> Response {
    let req = match req {
        Ok(Json(req)) => req,
        Err(e) => return error_response(e.status(), e.body_text()),
    };
    let out = match state.upstreams.dispatch(&req) {
        Ok(out) => out,
        Err(e @ DispatchError::MissingKey { .. }) => {
            warn!(endpoint = %req.endpoint, "{e}");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, e);
        }
        Err(e @ DispatchError::InvalidEndpoint(_)) => {
            return error_response(StatusCode::BAD_REQUEST, e);
        }
    };

    debug!(upstream = out.upstream, url = %out.url, "proxying");
    let mut request = state.http.get(&out.url).query(&out.query);
    for (name, value) in &out.headers {
        request = request.header(*name, value);
    }

    let resp = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(upstream = out.upstream, "proxy request failed: {e}");
            return error_response(StatusCode::BAD_GATEWAY, format!("{} unreachable", out.upstream));
        }
    };
    let status = resp.status();
    let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
    match resp.bytes().await {
        Ok(body) => {
            let mut response = (status, body).into_response();
            if let Some(ct) = content_type {
                response.headers_mut().insert(header::CONTENT_TYPE, ct);
            }
            response
        }
        Err(e) => {
            warn!(upstream = out.upstream, "failed to read upstream body: {e}");
            error_response(StatusCode::BAD_GATEWAY, format!("{} body unreadable", out.upstream))
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayersQuery {
    #[serde(default)]
    active: String,
    year: i32,
    intensity: Option<f64>,
    #[serde(default)]
    with_data: bool,
}

impl LayersQuery {
    fn ids(&self) -> Vec<LayerId> {
        self.active
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(LayerId::from)
            .collect()
    }
}

async fn layer_data(
    State(state): State<AppState>,
    q: Result<Query<LayersQuery>, QueryRejection>,
) -> Response {
    let q = match q {
        Ok(Query(q)) => q,
        Err(e) => return query_error(e),
    };
    let outcome = state.aggregator.fetch_all_data(&q.ids(), Year(q.year)).await;
    Json(outcome).into_response()
}

#[derive(Debug, Serialize)]
struct OverlayView {
    id: LayerId,
    paint: OverlayPaint,
    source: FeatureCollection,
}

#[derive(Debug, Serialize)]
struct OverlaysResponse {
    year: Year,
    report: SyncReport,
    overlays: Vec<OverlayView>,
}

async fn layer_overlays(
    State(state): State<AppState>,
    q: Result<Query<LayersQuery>, QueryRejection>,
) -> Response {
    let q = match q {
        Ok(Query(q)) => q,
        Err(e) => return query_error(e),
    };
    let ids = q.ids();
    let mut view = ViewState::from_catalog(&state.catalog, Year(q.year));
    for id in &ids {
        view = view.set_active(id, true);
        if let Some(i) = q.intensity {
            view = view.set_intensity(id, i);
        }
    }

    let outcome = if q.with_data {
        Some(state.aggregator.fetch_all_data(&view.active_ids(), view.year).await)
    } else {
        None
    };

    let mut surface = HeadlessSurface::new();
    let mut sync = OverlaySynchronizer::new(state.catalog.clone());
    let report = sync.sync(&mut surface, &view, outcome.as_ref().map(|o| &o.data));

    let overlays = sync
        .present_ids()
        .filter_map(|id| {
            let layer = view.layer(id)?;
            let source = surface.source(&id.source_id())?.clone();
            Some(OverlayView {
                id: id.clone(),
                paint: OverlayPaint::for_layer(layer),
                source,
            })
        })
        .collect();

    Json(OverlaysResponse {
        year: view.year,
        report,
        overlays,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

async fn search(
    State(state): State<AppState>,
    q: Result<Query<SearchQuery>, QueryRejection>,
) -> Response {
    let q = match q {
        Ok(Query(q)) => q,
        Err(e) => return query_error(e),
    };
    let limit = q.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_SEARCH_LIMIT);
    Json(state.catalog.search(&q.q, limit)).into_response()
}
