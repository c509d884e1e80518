#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use open_car_diagnostics::shell::BuildStamp;
use open_car_diagnostics::state::AppState;
use open_car_diagnostics::{ServerConfig, ShutdownConfig, ShutdownCoordinator, build_router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub const STAMP: &str = "2024-01-01T00:00:00Z";

pub fn config() -> ServerConfig {
    ServerConfig {
        build_stamp: BuildStamp::new(STAMP),
        ..ServerConfig::default()
    }
}

pub fn state(config: ServerConfig) -> Arc<AppState> {
    let coordinator = Arc::new(ShutdownCoordinator::new(ShutdownConfig {
        stop_accepting_grace: Duration::from_millis(1),
        drain_timeout: Duration::from_secs(2),
        handler_timeout: Duration::from_secs(1),
        total_timeout: Duration::from_secs(5),
    }));
    Arc::new(AppState::new(Arc::new(config), coordinator).expect("state"))
}

pub fn router(config: ServerConfig) -> (Router, Arc<AppState>) {
    let state = state(config);
    (build_router(state.clone()), state)
}

pub struct Captured {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl Captured {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("json body")
    }
}

pub async fn send(router: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Captured {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();

    Captured {
        status,
        content_type,
        body: String::from_utf8(bytes.to_vec()).expect("utf-8 body"),
    }
}

pub async fn get(router: Router, uri: &str) -> Captured {
    send(router, Method::GET, uri, None).await
}

/// Serve on an ephemeral port until the state's shutdown token is cancelled.
pub async fn serve(state: Arc<AppState>) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let token = state.coordinator().token();
    let router = build_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
            .expect("serve");
    });
    (addr, handle)
}
