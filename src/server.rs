//! HTTP surface: pages, the logo asset, small JSON APIs, the device
//! WebSocket, health and metrics.

use crate::device::RedactedProfile;
use crate::device::ws::{WS_PATH, ws_handler};
use crate::error::Result;
use crate::health::{components_handler, liveness_handler, readiness_handler};
use crate::logging::page_span;
use crate::metrics::METRICS;
use crate::page::UPDATE_ENDPOINT;
use crate::routes::RouteMatch;
use crate::shell::{LOGO_SRC, UpdateState};
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const FAVICON_SVG: &str = include_str!("../assets/favicon.svg");

const METRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route(LOGO_SRC, get(favicon_handler))
        .route("/api/version", get(version_handler))
        .route("/api/device", get(device_handler))
        .route(
            UPDATE_ENDPOINT,
            get(update_state_handler).post(set_update_state_handler),
        )
        .route(WS_PATH, get(ws_handler))
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/health/components", get(components_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(page_handler)
        .with_state(state)
}

/// Renders the shell for any page path. Unrouted paths still get the full
/// shell, with the not-found view as content and a 404 status.
async fn page_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Result<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }

    let path = uri.path();
    page_span(path).in_scope(|| {
        let (matched, html) = state.render_page(path)?;
        METRICS.record_page(matched.as_str());
        tracing::debug!(outcome = matched.as_str(), "page rendered");

        let status = match matched {
            RouteMatch::Found => StatusCode::OK,
            RouteMatch::NotFound => StatusCode::NOT_FOUND,
        };
        Ok((status, Html(html)).into_response())
    })
}

async fn favicon_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        FAVICON_SVG,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub build_stamp: String,
    pub version: String,
    /// True when the packaging step never replaced the stamp.
    pub placeholder: bool,
}

async fn version_handler(State(state): State<Arc<AppState>>) -> Json<VersionInfo> {
    let stamp = state.shell().build_stamp();
    Json(VersionInfo {
        build_stamp: stamp.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        placeholder: stamp.is_placeholder(),
    })
}

async fn device_handler(State(state): State<Arc<AppState>>) -> Json<RedactedProfile> {
    Json(state.config().device.redacted())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateStateBody {
    pub state: UpdateState,
}

async fn update_state_handler(State(state): State<Arc<AppState>>) -> Json<UpdateStateBody> {
    Json(UpdateStateBody {
        state: state.prompt().state(),
    })
}

/// Drives the reload prompt: deploy tooling announces new content, the
/// page's Close button returns it to idle.
async fn set_update_state_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateStateBody>,
) -> Json<UpdateStateBody> {
    state.prompt().set(body.state);
    tracing::info!(state = %body.state, "update state set");
    Json(UpdateStateBody {
        state: state.prompt().state(),
    })
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        METRICS.encode(),
    )
}
