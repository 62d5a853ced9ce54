use std::sync::Arc;

use registry::{RefreshReport, TenantRegistry, remote::RemoteFetcher};
use tokio::task::spawn_blocking;
use tracing::info;

use super::{config::Config, error::AppError};

pub struct AppState {
    pub config: Config,
    pub registry: TenantRegistry,
    pub remote: RemoteFetcher,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let registry = TenantRegistry::new(&config.clients_root, config.host_aliases.clone());

        let report = registry.load();
        info!(
            "Loaded {} tenants from {} ({} configuration errors)",
            report.tenants.len(),
            config.clients_root.display(),
            report.errors.len()
        );

        let remote = RemoteFetcher::new(
            &config.proxy_scheme,
            config.proxy_timeout,
            config.proxy_connect_timeout,
        )?;

        Ok(Arc::new(Self {
            config,
            registry,
            remote,
        }))
    }

    /// Re-scans the clients root off the async workers.
    pub async fn refresh_registry(self: &Arc<Self>) -> Result<Arc<RefreshReport>, AppError> {
        let state = self.clone();

        spawn_blocking(move || state.registry.refresh())
            .await
            .map_err(AppError::internal)?
            .map_err(AppError::from)
    }
}
