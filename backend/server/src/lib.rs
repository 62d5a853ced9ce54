//! # Platform
//!
//! Multi-tenant backend serving every client site from one process.
//!
//!
//!
//! # General Infrastructure
//! - nginx terminates TLS for every client domain and proxies to this server
//! - nginx forwards the original host in `X-Forwarded-Host`
//! - Each client lives under `CLIENTS_ROOT/<domain>/` with `frontend/` and `data/`
//! - The client is picked per request from the host, see [`resolver`]
//! - One `msn_<userId>.json` per client, see the `registry` crate
//!
//!
//!
//! # Routes
//! - `GET /api/health`
//! - `GET /api/sites`: every registered tenant
//! - `GET /api/site/<userId>.json`: a tenant's manifest
//! - `GET|PUT /api/backend-data/<file>`: only files listed in the host's `backend_data`
//! - `POST /api/admin/refresh`: re-scan the clients root, needs `x-refresh-token`
//! - `GET /proxy/<domain>/msn_<userId>.json`: live fetch from another site, never cached
//! - `GET /profiles/<domain>`: redirect into the profile viewer
//! - Anything else is a static file from the host's frontend root
//!
//!
//!
//! # Refreshing
//! After adding or editing a client, either
//! ```sh
//! kill -HUP $(pidof backend)
//! ```
//! or
//! ```sh
//! curl -X POST -H "x-refresh-token: $(cat /run/secrets/REFRESH_TOKEN)" localhost:5000/api/admin/refresh
//! ```
//! A refresh that finds no valid clients keeps the previous registry.
//!
//!
//!
//! # Setup
//!
//! Check a clients tree before deploying.
//! ```sh
//! cargo run -p audit -- /srv/webapps/clients
//! ```
//!
//! Write a sample tree and serve it.
//! ```sh
//! cargo run -p tester -- ./clients
//! CLIENTS_ROOT=./clients HOST_ALIASES=localhost=example.com RUST_LOG=info cargo run -p backend
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use routes::{
    backend_data_read_handler, backend_data_write_handler, health_handler, profiles_handler,
    proxy_handler, refresh_handler, root_handler, site_handler, sites_handler, static_handler,
};
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;

    tokio::spawn(refresh_on_hangup(state.clone()));

    info!("Starting server...");
    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/sites", get(sites_handler))
        .route("/api/site/{file}", get(site_handler))
        .route(
            "/api/backend-data/{filename}",
            get(backend_data_read_handler).put(backend_data_write_handler),
        )
        .route("/api/admin/refresh", post(refresh_handler))
        .route("/proxy/{slug}/{filename}", get(proxy_handler))
        .route("/profiles/{slug}", get(profiles_handler))
        .route("/", get(root_handler))
        .route("/{*path}", get(static_handler))
        .layer(cors)
        .with_state(state)
}

#[cfg(unix)]
async fn refresh_on_hangup(state: Arc<AppState>) {
    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!("Failed to install hangup handler, refresh only via API: {e}");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("Received hangup signal, refreshing tenants");

        match state.refresh_registry().await {
            Ok(report) => info!(
                "Refreshed {} tenants ({} configuration errors)",
                report.tenants.len(),
                report.errors.len()
            ),
            Err(e) => warn!("Refresh failed: {e}"),
        }
    }
}

#[cfg(not(unix))]
async fn refresh_on_hangup(_state: Arc<AppState>) {}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
