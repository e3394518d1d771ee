//! # Authentication and Authorization
//!
//! This module provides administrator bearer authentication for the
//! health-check endpoint. A missing or malformed credential is a 401; a
//! well-formed bearer token that is not in the administrator set is a 403.
//! Rejected invocations are still audited when the target account can be
//! read from the query string.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::audit::{AuditLogger, AuditOutcome, OP_HEALTH_CHECK};
use crate::config::AppConfig;
use crate::error::{ApiError, forbidden, unauthorized};
use crate::repositories::SyncLogRepository;
use crate::server::AppState;

/// Marker type for authenticated administrator requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminAuth;

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Authentication middleware that validates administrator bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let checked: Result<(), ApiError> = extract_bearer_token(request.headers())
        .and_then(|token| validate_admin_token(&state.config, token));

    if let Err(error) = checked {
        audit_rejection(&state, request, &error).await;
        return Err(error);
    }

    request.extensions_mut().insert(AdminAuth);
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))
        .and_then(|value| {
            value
                .to_str()
                .map_err(|_| unauthorized(Some("Invalid Authorization header")))
        })
        .and_then(|header| {
            header
                .strip_prefix("Bearer ")
                .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
        })
}

fn validate_admin_token(config: &AppConfig, token: &str) -> Result<(), ApiError> {
    let is_admin = config
        .admin_tokens
        .iter()
        .any(|configured| ConstantTimeEq::ct_eq(token.as_bytes(), configured.as_bytes()).into());

    if is_admin {
        Ok(())
    } else {
        Err(forbidden(Some("Administrator privilege required")))
    }
}

/// Audit a rejected invocation against the account it targeted, when the
/// query string names one
async fn audit_rejection(state: &AppState, request: Request, error: &ApiError) {
    let Some(account_id) = account_id_from_query(&request) else {
        return;
    };

    AuditLogger::new(SyncLogRepository::new(state.db.clone()))
        .record(
            account_id,
            OP_HEALTH_CHECK,
            AuditOutcome::Fail,
            Some(error.status.as_u16() as i32),
            Some(error.message.to_string()),
            0,
            "ebay",
        )
        .await;
}

fn account_id_from_query(request: &Request) -> Option<Uuid> {
    request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "account_id")
            .and_then(|(_, value)| Uuid::parse_str(&value).ok())
    })
}

impl<S> FromRequestParts<S> for AdminAuth
where
    Arc<AppConfig>: FromRef<S>,
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminAuth>()
            .copied()
            .ok_or_else(|| forbidden(Some("Administrator privilege required")))
    }
}
