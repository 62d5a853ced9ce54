//! # Tenant Registry
//!
//! Host/user id index over the scanned clients.
//!
//! ## Publishing
//! - A new [`TenantMap`] is always built off to the side, then swapped in whole
//! - Readers clone the current `Arc<TenantMap>` and keep it for the whole request
//! - Records are `Arc`s, so two lookups on the same map return the same allocation
//! - Refreshes take `refresh_lock` so two of them never interleave
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{RegistryError, ScanError},
    manifest::{ClientError, DATA_DIR, DEFAULT_ENTRY, ScannedClient, scan_clients},
};

#[derive(Debug)]
pub struct TenantRecord {
    pub user_id: String,
    /// Primary domain (the client directory name) first, then manifest domains and aliases.
    pub domains: Vec<String>,
    pub client_root: PathBuf,
    pub frontend_root: PathBuf,
    pub manifest_path: PathBuf,
    pub data_dir: PathBuf,
    pub default_entry: String,
    pub allowed_data_files: Vec<String>,
    pub manifest: Value,
}

impl TenantRecord {
    fn from_scan(client: ScannedClient, domains: Vec<String>) -> Self {
        Self {
            user_id: client.manifest.user_id,
            domains,
            data_dir: client.client_root.join(DATA_DIR),
            client_root: client.client_root,
            frontend_root: client.frontend_root,
            manifest_path: client.manifest.path,
            default_entry: client
                .manifest
                .default_entry
                .unwrap_or_else(|| DEFAULT_ENTRY.to_string()),
            allowed_data_files: client.manifest.backend_data,
            manifest: client.manifest.document,
        }
    }

    pub fn primary_domain(&self) -> &str {
        &self.domains[0]
    }

    pub fn manifest_file_name(&self) -> String {
        format!("msn_{}.json", self.user_id)
    }
}

/// Lowercases and strips a trailing `:port`, also after a bracketed IPv6 address.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();

    let host = match host.rsplit_once(':') {
        Some((name, port))
            if (name.ends_with(']') || !name.contains(':'))
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    };

    host.trim_end_matches('.').to_ascii_lowercase()
}

#[derive(Debug, Default)]
pub struct TenantMap {
    by_host: HashMap<String, Arc<TenantRecord>>,
    by_user_id: HashMap<String, Arc<TenantRecord>>,
}

impl TenantMap {
    /// Indexes scanned clients, which arrive sorted by name.
    ///
    /// Hosts are claimed in rounds so sort order never lets one client take another's
    /// directory-name host:
    /// 1. user ids and primary hosts, the first claimant keeps them and later ones are rejected
    /// 2. operator aliases
    /// 3. manifest `domains`
    ///
    /// An alias or manifest domain that is already taken is dropped and reported, the client
    /// that listed it stays registered.
    pub fn build(
        clients: Vec<ScannedClient>,
        aliases: &HashMap<String, String>,
        errors: &mut Vec<ClientError>,
    ) -> Self {
        let mut aliases_by_client: HashMap<&str, Vec<&str>> = HashMap::new();
        for (host, client) in aliases {
            aliases_by_client
                .entry(client.as_str())
                .or_default()
                .push(host.as_str());
        }

        let mut owners: HashMap<String, String> = HashMap::new();
        let mut user_owners: HashMap<String, String> = HashMap::new();
        let mut accepted: Vec<(ScannedClient, Vec<String>)> = Vec::new();
        let mut seen_clients = HashSet::new();

        for client in clients {
            let name = client.name.clone();
            seen_clients.insert(name.clone());

            let user_id = &client.manifest.user_id;
            if let Some(owner) = user_owners.get(user_id) {
                warn!("Skipping client {name}: user {user_id} already registered");

                errors.push(ClientError {
                    client: name,
                    error: ScanError::DuplicateUserId {
                        user_id: user_id.clone(),
                        owner: owner.clone(),
                    },
                });
                continue;
            }

            let primary = normalize_host(&name);
            if let Some(owner) = owners.get(&primary) {
                warn!("Skipping client {name}: host {primary} already registered");

                errors.push(ClientError {
                    client: name,
                    error: ScanError::DuplicateHost {
                        host: primary,
                        owner: owner.clone(),
                    },
                });
                continue;
            }

            user_owners.insert(user_id.clone(), primary.clone());
            owners.insert(primary.clone(), primary.clone());
            accepted.push((client, vec![primary]));
        }

        for (client, domains) in &mut accepted {
            let mut client_aliases = aliases_by_client
                .get(client.name.as_str())
                .cloned()
                .unwrap_or_default();
            client_aliases.sort_unstable();

            claim_hosts(&client.name, client_aliases, domains, &mut owners, errors);
        }

        for (client, domains) in &mut accepted {
            let listed = client.manifest.domains.iter().map(String::as_str);

            claim_hosts(&client.name, listed, domains, &mut owners, errors);
        }

        for (host, client) in aliases {
            if !seen_clients.contains(client) {
                warn!("Ignoring alias {host}: no client named {client}");
            }
        }

        let mut map = Self::default();
        for (client, domains) in accepted {
            let record = Arc::new(TenantRecord::from_scan(client, domains));
            for host in &record.domains {
                map.by_host.insert(host.clone(), record.clone());
            }
            map.by_user_id.insert(record.user_id.clone(), record);
        }

        map
    }

    pub fn resolve_by_host(&self, host: &str) -> Option<Arc<TenantRecord>> {
        self.by_host.get(&normalize_host(host)).cloned()
    }

    pub fn resolve_by_user_id(&self, user_id: &str) -> Option<Arc<TenantRecord>> {
        self.by_user_id.get(user_id).cloned()
    }

    /// All tenants, sorted by user id.
    pub fn list(&self) -> Vec<Arc<TenantRecord>> {
        let mut tenants: Vec<_> = self.by_user_id.values().cloned().collect();
        tenants.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        tenants
    }

    pub fn len(&self) -> usize {
        self.by_user_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user_id.is_empty()
    }
}

// `domains[0]` is the client's primary host
fn claim_hosts<'a>(
    client: &str,
    hosts: impl IntoIterator<Item = &'a str>,
    domains: &mut Vec<String>,
    owners: &mut HashMap<String, String>,
    errors: &mut Vec<ClientError>,
) {
    for host in hosts {
        let host = normalize_host(host);
        if host.is_empty() || domains.contains(&host) {
            continue;
        }

        if let Some(owner) = owners.get(&host) {
            warn!("Ignoring host {host} for {client}: already registered by {owner}");

            errors.push(ClientError {
                client: client.to_string(),
                error: ScanError::DuplicateHost {
                    host,
                    owner: owner.clone(),
                },
            });
            continue;
        }

        owners.insert(host.clone(), domains[0].clone());
        domains.push(host);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportEntry {
    pub client: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub tenants: Vec<String>,
    pub errors: Vec<ReportEntry>,
}

pub struct TenantRegistry {
    clients_root: PathBuf,
    aliases: HashMap<String, String>,
    current: RwLock<Arc<TenantMap>>,
    last_report: RwLock<Arc<RefreshReport>>,
    refresh_lock: Mutex<()>,
}

impl TenantRegistry {
    /// Creates an empty registry. Nothing is scanned until [`TenantRegistry::load`].
    pub fn new(clients_root: impl AsRef<Path>, aliases: HashMap<String, String>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(host, client)| (normalize_host(&host), client))
            .collect();

        Self {
            clients_root: clients_root.as_ref().to_path_buf(),
            aliases,
            current: RwLock::new(Arc::new(TenantMap::default())),
            last_report: RwLock::new(Arc::new(RefreshReport::default())),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn clients_root(&self) -> &Path {
        &self.clients_root
    }

    /// Startup scan. Publishes whatever was found, even nothing.
    pub fn load(&self) -> Arc<RefreshReport> {
        let _guard = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (map, report) = self.build();
        if map.is_empty() {
            warn!("No tenants found under {}", self.clients_root.display());
        }

        self.publish(map, report)
    }

    /// Re-scans and swaps in the new map. If nothing valid is found the previous map stays.
    pub fn refresh(&self) -> Result<Arc<RefreshReport>, RegistryError> {
        let _guard = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (map, report) = self.build();
        if map.is_empty() {
            warn!(
                "Refresh of {} found no valid tenants, keeping previous registry",
                self.clients_root.display()
            );

            let errors = report.errors.len();
            *self.last_report.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(report);

            return Err(RegistryError::NoTenants { errors });
        }

        Ok(self.publish(map, report))
    }

    fn build(&self) -> (TenantMap, RefreshReport) {
        let mut scan = scan_clients(&self.clients_root);
        let map = TenantMap::build(scan.clients, &self.aliases, &mut scan.errors);

        let report = RefreshReport {
            tenants: map.list().iter().map(|t| t.user_id.clone()).collect(),
            errors: scan
                .errors
                .iter()
                .map(|e| ReportEntry {
                    client: e.client.clone(),
                    error: e.error.to_string(),
                })
                .collect(),
        };

        (map, report)
    }

    fn publish(&self, map: TenantMap, report: RefreshReport) -> Arc<RefreshReport> {
        info!(
            "Publishing {} tenants ({} configuration errors)",
            map.len(),
            report.errors.len()
        );

        let report = Arc::new(report);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(map);
        *self.last_report.write().unwrap_or_else(PoisonError::into_inner) = report.clone();

        report
    }

    /// The currently published map. Holding it pins every record in it.
    pub fn snapshot(&self) -> Arc<TenantMap> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_report(&self) -> Arc<RefreshReport> {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn resolve_by_host(&self, host: &str) -> Option<Arc<TenantRecord>> {
        self.snapshot().resolve_by_host(host)
    }

    pub fn resolve_by_user_id(&self, user_id: &str) -> Option<Arc<TenantRecord>> {
        self.snapshot().resolve_by_user_id(user_id)
    }

    pub fn list(&self) -> Vec<Arc<TenantRecord>> {
        self.snapshot().list()
    }
}
