//! # Manifest Scanner
//!
//! Finds the single `msn_<userId>.json` in each client's `frontend/` directory.
//!
//! - Only the top level of `frontend/` is searched
//! - Any file starting with `msn_` and ending with `.json` counts as a candidate
//! - Zero candidates, more than one, or a candidate with a bad id is a configuration error
//! - Errors are per client, one broken client never stops the scan
use std::{
    ffi::OsStr,
    fs,
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::ScanError;

pub const MANIFEST_PREFIX: &str = "msn_";
pub const MANIFEST_SUFFIX: &str = ".json";
pub const FRONTEND_DIR: &str = "frontend";
pub const DATA_DIR: &str = "data";
pub const DEFAULT_ENTRY: &str = "index.html";

const MSS_SECTION: &str = "MSS";
const BACKEND_DATA: &str = "backend_data";
const FRONTEND_ROOT: &str = "frontend_root";
const DEFAULT_ENTRY_KEY: &str = "default_entry";
const DOMAINS: &str = "domains";

static MANIFEST_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^msn_([A-Za-z0-9_-]+)\.json$").unwrap());

#[derive(Debug, Clone)]
pub struct Manifest {
    pub user_id: String,
    pub path: PathBuf,
    pub backend_data: Vec<String>,
    pub frontend_root: Option<String>,
    pub default_entry: Option<String>,
    pub domains: Vec<String>,
    pub document: Value,
}

#[derive(Debug)]
pub struct ScannedClient {
    pub name: String,
    pub client_root: PathBuf,
    pub frontend_root: PathBuf,
    pub manifest: Manifest,
}

#[derive(Debug)]
pub struct ClientError {
    pub client: String,
    pub error: ScanError,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub clients: Vec<ScannedClient>,
    pub errors: Vec<ClientError>,
}

/// Returns the user id embedded in a manifest filename.
pub fn parse_manifest_name(file_name: &str) -> Option<&str> {
    MANIFEST_NAME
        .captures(file_name)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

fn is_candidate(file_name: &str) -> bool {
    file_name.starts_with(MANIFEST_PREFIX) && file_name.ends_with(MANIFEST_SUFFIX)
}

pub fn find_manifest(frontend_dir: &Path) -> Result<PathBuf, ScanError> {
    if !frontend_dir.is_dir() {
        return Err(ScanError::MissingManifest(frontend_dir.to_path_buf()));
    }

    let io_error = |source| ScanError::Io {
        path: frontend_dir.to_path_buf(),
        source,
    };

    let mut candidates = Vec::new();
    for entry in fs::read_dir(frontend_dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        if is_candidate(&name) && entry.path().is_file() {
            candidates.push(name);
        }
    }

    candidates.sort();

    match candidates.len() {
        0 => Err(ScanError::MissingManifest(frontend_dir.to_path_buf())),
        1 => {
            let only = candidates.remove(0);
            if parse_manifest_name(&only).is_some() {
                Ok(frontend_dir.join(only))
            } else {
                Err(ScanError::InvalidManifestName(only))
            }
        }
        _ => Err(ScanError::AmbiguousManifest {
            dir: frontend_dir.to_path_buf(),
            candidates,
        }),
    }
}

pub fn load_manifest(path: &Path) -> Result<Manifest, ScanError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let user_id = parse_manifest_name(file_name)
        .ok_or_else(|| ScanError::InvalidManifestName(file_name.to_string()))?
        .to_string();

    let contents = fs::read(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: Value =
        serde_json::from_slice(&contents).map_err(|source| ScanError::MalformedJson {
            path: path.to_path_buf(),
            source,
        })?;

    let Some(fields) = document.as_object() else {
        return Err(ScanError::NotAnObject(path.to_path_buf()));
    };

    Ok(Manifest {
        user_id,
        path: path.to_path_buf(),
        backend_data: string_list(lookup(fields, BACKEND_DATA)),
        frontend_root: lookup(fields, FRONTEND_ROOT)
            .and_then(Value::as_str)
            .map(str::to_owned),
        default_entry: lookup(fields, DEFAULT_ENTRY_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned),
        domains: string_list(lookup(fields, DOMAINS)),
        document,
    })
}

// top level wins over the MSS section
fn lookup<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).or_else(|| {
        fields
            .get(MSS_SECTION)
            .and_then(Value::as_object)
            .and_then(|mss| mss.get(key))
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Resolves the `frontend_root` setting against the client directory. The setting must be a
/// relative path of plain names that does not start in `data/`.
pub fn resolve_frontend_root(
    client_root: &Path,
    setting: Option<&str>,
) -> Result<PathBuf, ScanError> {
    let Some(setting) = setting else {
        return Ok(client_root.join(FRONTEND_DIR));
    };

    let relative = Path::new(setting);
    let mut components = relative.components().peekable();

    let plain = components.peek().is_some()
        && components.peek() != Some(&Component::Normal(OsStr::new(DATA_DIR)))
        && components.all(|c| matches!(c, Component::Normal(_)));
    if !plain {
        return Err(ScanError::UnsafeFrontendRoot(setting.to_string()));
    }

    Ok(client_root.join(relative))
}

// symlinks can still point the resolved root somewhere else
fn confine_frontend_root(
    client_root: &Path,
    frontend_root: &Path,
    setting: &str,
) -> Result<(), ScanError> {
    let canonical = |path: &Path| {
        fs::canonicalize(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })
    };

    let client = canonical(client_root)?;
    let frontend = canonical(frontend_root)?;

    if frontend == client
        || !frontend.starts_with(&client)
        || frontend.starts_with(client.join(DATA_DIR))
    {
        return Err(ScanError::UnsafeFrontendRoot(setting.to_string()));
    }

    Ok(())
}

pub fn scan_client(client_root: &Path) -> Result<(Manifest, PathBuf), ScanError> {
    let manifest_path = find_manifest(&client_root.join(FRONTEND_DIR))?;
    let manifest = load_manifest(&manifest_path)?;

    let setting = manifest.frontend_root.as_deref();
    let frontend_root = resolve_frontend_root(client_root, setting)?;
    if !frontend_root.is_dir() {
        return Err(ScanError::MissingFrontend(frontend_root));
    }
    confine_frontend_root(client_root, &frontend_root, setting.unwrap_or(FRONTEND_DIR))?;

    Ok((manifest, frontend_root))
}

/// Scans every client directory under `clients_root`. Never mutates anything on disk.
pub fn scan_clients(clients_root: &Path) -> ScanReport {
    let mut report = ScanReport::default();

    let entries = match fs::read_dir(clients_root) {
        Ok(entries) => entries,
        Err(source) => {
            warn!("Failed to read clients root {}: {source}", clients_root.display());

            report.errors.push(ClientError {
                client: clients_root.display().to_string(),
                error: ScanError::Io {
                    path: clients_root.to_path_buf(),
                    source,
                },
            });

            return report;
        }
    };

    let mut client_dirs: Vec<(String, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_owned();
            (!name.starts_with('.')).then(|| (name, entry.path()))
        })
        .collect();

    client_dirs.sort();

    for (name, client_root) in client_dirs {
        match scan_client(&client_root) {
            Ok((manifest, frontend_root)) => {
                info!("Found manifest for {name}: user {}", manifest.user_id);

                report.clients.push(ScannedClient {
                    name,
                    client_root,
                    frontend_root,
                    manifest,
                });
            }
            Err(error) => {
                warn!("Skipping client {name}: {error}");

                report.errors.push(ClientError {
                    client: name,
                    error,
                });
            }
        }
    }

    report
}
