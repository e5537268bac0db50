pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use service_core::axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, header},
    middleware::from_fn,
    routing::get,
};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ProfileConfig;
use crate::middleware::metrics_middleware;
use crate::services::{ConfigCache, ProfileReadService, ProfileStore};

#[derive(Clone)]
pub struct AppState {
    pub config: ProfileConfig,
    pub profiles: ProfileReadService,
    pub store: Arc<dyn ProfileStore>,
    pub cache: Arc<dyn ConfigCache>,
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    let reads = Router::new()
        .route("/user/v3/read/:user_id", get(handlers::read_v3))
        .route("/user/v4/read/:user_id", get(handlers::read_v4))
        .route("/private/user/v3/read/:user_id", get(handlers::private_read_v3))
        .route("/private/user/v4/read/:user_id", get(handlers::private_read_v4))
        .route_layer(from_fn(metrics_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(reads)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Outermost so the trace span sees the generated id.
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static("x-request-id"),
                    HeaderName::from_static("x-authenticated-userid"),
                    HeaderName::from_static("x-managed-for"),
                    HeaderName::from_static("x-authenticated-for"),
                ]),
        )
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        AppError::ServiceUnavailable
    })?;

    state.cache.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "postgresql": "up",
            "redis": "up"
        }
    })))
}
