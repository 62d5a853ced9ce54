use std::{path::PathBuf, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Request, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use registry::{RefreshReport, TenantRecord, gate, remote::is_valid_slug};
use serde::Serialize;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};

use crate::{
    error::AppError,
    resolver::{TenantContext, resolve_user_id},
    state::AppState,
    utils::{
        confine_static, get_json_from_body, read_json, static_path, tokens_match, write_json,
    },
};

pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSummary {
    pub user_id: String,
    pub manifest: String,
    pub domains: Vec<String>,
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn sites_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SiteSummary>> {
    let sites = state
        .registry
        .list()
        .iter()
        .map(|tenant| SiteSummary {
            user_id: tenant.user_id.clone(),
            manifest: tenant.manifest_file_name(),
            domains: tenant.domains.clone(),
        })
        .collect();

    Json(sites)
}

/// `GET /api/site/<userId>.json`
pub async fn site_handler(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user_id = file.strip_suffix(".json").ok_or(AppError::NotFound)?;
    let tenant = resolve_user_id(&state, user_id)?;

    Ok(Json(tenant.manifest.clone()))
}

pub async fn backend_data_read_handler(
    TenantContext(tenant): TenantContext,
    Path(filename): Path<String>,
) -> Result<Json<Value>, AppError> {
    let path = gate::check(&tenant, &filename).inspect_err(|_| {
        warn!("Rejected backend data read of {filename} for {}", tenant.user_id);
    })?;

    Ok(Json(read_json(&path).await?))
}

pub async fn backend_data_write_handler(
    TenantContext(tenant): TenantContext,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let path = gate::check(&tenant, &filename).inspect_err(|_| {
        warn!("Rejected backend data write of {filename} for {}", tenant.user_id);
    })?;

    let payload = get_json_from_body(&body)?;
    write_json(&path, &payload).await?;

    info!("Wrote backend data {filename} for {}", tenant.user_id);

    Ok(Json(json!({ "status": "ok" })))
}

pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RefreshReport>, AppError> {
    let expected = state
        .config
        .refresh_token
        .as_deref()
        .ok_or(AppError::Forbidden)?;

    let provided = headers
        .get(REFRESH_TOKEN_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();
    if !tokens_match(provided, expected.as_bytes()) {
        warn!("Rejected registry refresh with a missing or wrong token");
        return Err(AppError::Forbidden);
    }

    let report = state.refresh_registry().await?;

    Ok(Json(report.as_ref().clone()))
}

pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    Path((slug, filename)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let manifest = state
        .remote
        .fetch_manifest(&slug, &filename)
        .await
        .inspect_err(|e| warn!("Proxy fetch failed: {e}"))?;

    Ok(Json(manifest))
}

pub async fn profiles_handler(Path(slug): Path<String>) -> Result<Redirect, AppError> {
    if !is_valid_slug(&slug) {
        return Err(AppError::NotFound);
    }

    Ok(Redirect::to(&format!("/?external={slug}")))
}

pub async fn root_handler(
    TenantContext(tenant): TenantContext,
    request: Request,
) -> Result<Response, AppError> {
    serve_static(&tenant, &tenant.default_entry, request).await
}

pub async fn static_handler(
    TenantContext(tenant): TenantContext,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    serve_static(&tenant, &path, request).await
}

async fn serve_static(
    tenant: &TenantRecord,
    request_path: &str,
    request: Request,
) -> Result<Response, AppError> {
    let file = static_path(&tenant.frontend_root, request_path).ok_or(AppError::NotFound)?;
    let file = confine_static(&file, &tenant.frontend_root, &tenant.data_dir)
        .await
        .ok_or(AppError::NotFound)?;

    Ok(serve_file(file, request).await)
}

async fn serve_file(file: PathBuf, request: Request) -> Response {
    match ServeFile::new(file).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
