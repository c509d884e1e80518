//! Error types for the diagnostics server.
//!
//! The shell itself cannot fail; everything here belongs to the layers around
//! it: configuration, page rendering, the device channel and mDNS. Each error
//! carries a stable [`ErrorCode`] that decides its HTTP status and the
//! category it is counted under in the metrics registry.

use crate::device::ProfileError;
use crate::metrics::METRICS;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T, E = DiagnosticsError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    InvalidConfig = 1001,
    InvalidDeviceProfile = 1002,
    Io = 2001,
    TemplateRender = 3001,
    MdnsPacket = 4001,
    MdnsName = 4002,
    WebSocketTransport = 5001,
}

impl ErrorCode {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig | ErrorCode::InvalidDeviceProfile => "config_error",
            ErrorCode::Io => "io_error",
            ErrorCode::TemplateRender => "render_error",
            ErrorCode::MdnsPacket | ErrorCode::MdnsName => "mdns_error",
            ErrorCode::WebSocketTransport => "transport_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidConfig | ErrorCode::InvalidDeviceProfile => StatusCode::BAD_REQUEST,
            ErrorCode::MdnsPacket | ErrorCode::MdnsName => StatusCode::BAD_REQUEST,
            ErrorCode::WebSocketTransport => StatusCode::BAD_GATEWAY,
            ErrorCode::Io | ErrorCode::TemplateRender => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid device profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to render page: {0}")]
    Template(#[from] tera::Error),

    #[error("malformed mDNS packet: {0}")]
    MdnsPacket(#[from] dns_parser::Error),

    #[error("mDNS name {0:?} cannot be encoded")]
    MdnsName(String),

    #[error("websocket transport error: {0}")]
    WebSocket(#[from] axum::Error),
}

impl DiagnosticsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DiagnosticsError::Config(_) => ErrorCode::InvalidConfig,
            DiagnosticsError::Profile(_) => ErrorCode::InvalidDeviceProfile,
            DiagnosticsError::Io(_) => ErrorCode::Io,
            DiagnosticsError::Template(_) => ErrorCode::TemplateRender,
            DiagnosticsError::MdnsPacket(_) => ErrorCode::MdnsPacket,
            DiagnosticsError::MdnsName(_) => ErrorCode::MdnsName,
            DiagnosticsError::WebSocket(_) => ErrorCode::WebSocketTransport,
        }
    }

    /// Count this error under its category.
    pub fn track(&self) {
        METRICS.record_error(self.code().category());
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub category: String,
    pub message: String,
}

impl IntoResponse for DiagnosticsError {
    fn into_response(self) -> Response {
        self.track();
        let code = self.code();
        tracing::error!(error = %self, code = %code, "request failed");
        let body = ErrorBody {
            code: code.code(),
            category: code.category().to_string(),
            message: self.to_string(),
        };
        (code.status(), Json(body)).into_response()
    }
}
