//! # Error Handling
//!
//! This module provides unified error handling for the Marketplace Connect
//! API, implementing a consistent problem+json response format with trace ID
//! propagation and the health-check error taxonomy.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Extract current trace ID from the active tracing span (falls back to a generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

/// Create an unauthorized error (401): no usable bearer credential
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create a forbidden error (403): authenticated but not an administrator
pub fn forbidden(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Administrator privilege required");
    ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", msg)
}

/// Create a not-found error (404) for an unknown or inactive account
pub fn account_not_found() -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "ACCOUNT_NOT_FOUND",
        "Marketplace account not found or inactive",
    )
}

/// Create a failed-dependency error (424): no stored token generation
pub fn token_missing() -> ApiError {
    ApiError::new(
        StatusCode::FAILED_DEPENDENCY,
        "TOKEN_MISSING",
        "No stored token for this account; authorization must be granted first",
    )
}

/// Create a failed-dependency error (424): expired with no refresh token
pub fn token_unrecoverable() -> ApiError {
    ApiError::new(
        StatusCode::FAILED_DEPENDENCY,
        "TOKEN_UNRECOVERABLE",
        "Access token expired and no refresh token is stored; re-consent required",
    )
}

/// Create an internal error (500) for missing server-side configuration
pub fn configuration_missing(detail: &str) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "CONFIGURATION_MISSING",
        &format!("Server configuration incomplete: {}", detail),
    )
}

/// Create a generic internal error (500).
///
/// Used for cryptographic failures among others; callers must not attach
/// key or ciphertext detail.
pub fn server_error() -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_SERVER_ERROR",
        "An internal error occurred",
    )
}

/// Create a provider upstream error (502).
///
/// Provider-issued OAuth error codes are surfaced in the details: they are
/// actionable for an operator debugging a broken integration.
pub fn provider_error(provider: &str, status: Option<u16>, code: Option<&str>) -> ApiError {
    let mut details = json!({ "provider": provider });
    if let Some(status) = status {
        details["status"] = json!(status);
    }
    if let Some(code) = code {
        details["error"] = json!(code);
    }

    ApiError::new(
        StatusCode::BAD_GATEWAY,
        "PROVIDER_ERROR",
        &format!("Provider {} request failed", provider),
    )
    .with_details(details)
}
