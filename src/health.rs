//! Liveness, readiness and per-component health.

use crate::state::{AppState, MdnsStatus};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but something needs attention
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Worst of the two.
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn build(component: &str, status: HealthStatus, error: Option<String>) -> Self {
        Self {
            component: component.to_string(),
            status,
            error,
            timestamp: now(),
            details: None,
        }
    }

    pub fn healthy(component: &str) -> Self {
        Self::build(component, HealthStatus::Healthy, None)
    }

    pub fn degraded(component: &str, error: impl Into<String>) -> Self {
        Self::build(component, HealthStatus::Degraded, Some(error.into()))
    }

    pub fn unhealthy(component: &str, error: impl Into<String>) -> Self {
        Self::build(component, HealthStatus::Unhealthy, Some(error.into()))
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: i64,
    pub version: String,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        (self.status.status_code(), Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub status: HealthStatus,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_ready: Vec<String>,
}

impl IntoResponse for ReadinessResponse {
    fn into_response(self) -> Response {
        let status = if self.ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthResponse {
    pub status: HealthStatus,
    pub timestamp: i64,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl IntoResponse for ComponentHealthResponse {
    fn into_response(self) -> Response {
        (self.status.status_code(), Json(self)).into_response()
    }
}

pub struct HealthChecker<'a> {
    state: &'a AppState,
}

impl<'a> HealthChecker<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub fn liveness(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Healthy,
            timestamp: now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Not ready while any component is unhealthy or once shutdown began.
    pub fn readiness(&self) -> ReadinessResponse {
        let components = self.check_all();
        let mut overall = HealthStatus::Healthy;
        let mut not_ready = Vec::new();

        for (name, health) in &components {
            overall = overall.combine(health.status);
            if health.status == HealthStatus::Unhealthy {
                not_ready.push(name.clone());
            }
        }
        if self.state.coordinator().is_shutdown_initiated() {
            not_ready.push("shutdown".to_string());
        }

        ReadinessResponse {
            ready: not_ready.is_empty(),
            status: overall,
            timestamp: now(),
            not_ready,
        }
    }

    pub fn components(&self) -> ComponentHealthResponse {
        let components = self.check_all();
        let status = components
            .values()
            .fold(HealthStatus::Healthy, |acc, h| acc.combine(h.status));
        ComponentHealthResponse {
            status,
            timestamp: now(),
            components,
        }
    }

    fn check_all(&self) -> BTreeMap<String, ComponentHealth> {
        [self.check_build_stamp(), self.check_websocket(), self.check_mdns()]
            .into_iter()
            .map(|health| (health.component.clone(), health))
            .collect()
    }

    fn check_build_stamp(&self) -> ComponentHealth {
        let stamp = self.state.shell().build_stamp();
        let health = if stamp.is_placeholder() {
            ComponentHealth::degraded("build_stamp", "build stamp was never substituted")
        } else {
            ComponentHealth::healthy("build_stamp")
        };
        health.with_details(serde_json::json!({ "build_stamp": stamp }))
    }

    fn check_websocket(&self) -> ComponentHealth {
        let coordinator = self.state.coordinator();
        let health = if coordinator.is_shutdown_initiated() {
            ComponentHealth::degraded("websocket", "closing sessions for shutdown")
        } else {
            ComponentHealth::healthy("websocket")
        };
        health.with_details(serde_json::json!({
            "active_sessions": coordinator.active_connection_count(),
        }))
    }

    fn check_mdns(&self) -> ComponentHealth {
        let status = self.state.mdns_status();
        let health = match &status {
            MdnsStatus::Disabled | MdnsStatus::Running => ComponentHealth::healthy("mdns"),
            MdnsStatus::Stopped => ComponentHealth::degraded("mdns", "responder is not running"),
            MdnsStatus::Failed(reason) => ComponentHealth::unhealthy("mdns", reason.clone()),
        };
        health.with_details(serde_json::json!({
            "name": self.state.config().device.mdns_name(),
            "status": status,
        }))
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub async fn liveness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HealthChecker::new(&state).liveness()
}

pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HealthChecker::new(&state).readiness()
}

pub async fn components_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HealthChecker::new(&state).components()
}
