//! Application error type and the JSON error envelope.
//!
//! Every error response has the shape:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "NOT_FOUND",
//!     "message": "Route not found",
//!     "requestId": "3f0c…",
//!     "statusCode": 404,
//!     "timestamp": "2026-01-01T00:00:00Z",
//!     "stack": "…"
//!   }
//! }
//! ```
//!
//! `stack` carries the error's source chain and is omitted in production.
//! The message is returned and logged verbatim; only structured log context
//! is redacted.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::domain::RequestContext;

static EXPOSE_STACK: OnceLock<bool> = OnceLock::new();

/// Sets whether error responses include the `stack` field.
///
/// Called once at startup; later calls are ignored. Defaults to `true`
/// (non-production behaviour) when never called.
pub fn configure_stack_exposure(expose: bool) {
    let _ = EXPOSE_STACK.set(expose);
}

fn expose_stack() -> bool {
    *EXPOSE_STACK.get().unwrap_or(&true)
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorInfo {
    code: &'static str,
    message: String,
    request_id: Option<String>,
    status_code: u16,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Value::is_null")]
    details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },
    #[error("{message}")]
    Unauthorized { message: String, details: Value },
    #[error("{message}")]
    Forbidden { message: String, details: Value },
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{message}")]
    Dependency {
        message: String,
        cause: Option<anyhow::Error>,
    },
    #[error("{message}")]
    Internal {
        message: String,
        cause: Option<anyhow::Error>,
    },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn unauthorized(message: impl Into<String>, details: Value) -> Self {
        Self::Unauthorized {
            message: message.into(),
            details,
        }
    }
    pub fn forbidden(message: impl Into<String>, details: Value) -> Self {
        Self::Forbidden {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn dependency(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Dependency {
            message: message.into(),
            cause: Some(source.into()),
        }
    }
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            cause: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Dependency { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Dependency { .. } => "DEPENDENCY_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Client errors are expected outcomes; server errors are not.
    pub fn is_operational(&self) -> bool {
        self.status_code().is_client_error()
    }

    fn stack(&self) -> Option<String> {
        match self {
            Self::Dependency {
                cause: Some(cause), ..
            }
            | Self::Internal {
                cause: Some(cause), ..
            } => Some(format!("{cause:?}")),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal {
            message: "Internal server error".to_string(),
            cause: Some(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = RequestContext::current().map(|ctx| ctx.request_id);
        let stack = if expose_stack() { self.stack() } else { None };

        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                request_id = request_id.as_deref().unwrap_or("-"),
                operational = false,
                stack = stack.as_deref().unwrap_or(""),
                "{}",
                self
            );
        } else {
            tracing::warn!(
                code = self.code(),
                request_id = request_id.as_deref().unwrap_or("-"),
                "{}",
                self
            );
        }

        let code = self.code();
        let (message, details) = match self {
            Self::Validation { message, details }
            | Self::Unauthorized { message, details }
            | Self::Forbidden { message, details }
            | Self::NotFound { message, details } => (message, details),
            Self::Dependency { message, .. } | Self::Internal { message, .. } => {
                (message, Value::Null)
            }
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code,
                message,
                request_id,
                status_code: status.as_u16(),
                timestamp: Utc::now(),
                details,
                stack,
            },
        };

        (status, Json(body)).into_response()
    }
}
