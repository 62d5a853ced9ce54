//! # Request Resolver
//!
//! One request, one tenant.
//!
//! - `X-Forwarded-Host` (set by nginx) wins over `Host`
//! - Unknown hosts fall back to `DEFAULT_CLIENT_SLUG` only when it is configured
//! - The resolved record is an `Arc` from the snapshot taken at resolve time, a refresh during
//!   the request does not change it
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::HOST, request::Parts},
};
use registry::TenantRecord;

use crate::{error::AppError, state::AppState};

pub const FORWARDED_HOST: &str = "x-forwarded-host";

pub fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(FORWARDED_HOST)
        .or_else(|| headers.get(HOST))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|host| !host.is_empty())
}

pub fn resolve_host(state: &AppState, headers: &HeaderMap) -> Result<Arc<TenantRecord>, AppError> {
    let snapshot = state.registry.snapshot();

    request_host(headers)
        .and_then(|host| snapshot.resolve_by_host(host))
        .or_else(|| {
            state
                .config
                .default_client
                .as_deref()
                .and_then(|fallback| snapshot.resolve_by_host(fallback))
        })
        .ok_or(AppError::TenantNotFound)
}

pub fn resolve_user_id(state: &AppState, user_id: &str) -> Result<Arc<TenantRecord>, AppError> {
    state
        .registry
        .resolve_by_user_id(user_id)
        .ok_or(AppError::TenantNotFound)
}

/// The tenant owning the request's host.
pub struct TenantContext(pub Arc<TenantRecord>);

impl FromRequestParts<Arc<AppState>> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_host(state, &parts.headers).map(TenantContext)
    }
}
