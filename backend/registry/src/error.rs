use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No msn_<user>.json manifest found under {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("Multiple manifests found under {}: {}", .dir.display(), .candidates.join(", "))]
    AmbiguousManifest {
        dir: PathBuf,
        candidates: Vec<String>,
    },

    #[error("Invalid manifest filename: {0}")]
    InvalidManifestName(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed manifest {}: {source}", .path.display())]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Manifest {} is not a JSON object", .0.display())]
    NotAnObject(PathBuf),

    #[error("Frontend root {} does not exist", .0.display())]
    MissingFrontend(PathBuf),

    #[error("Frontend root {0:?} must be a directory inside the client, outside data/")]
    UnsafeFrontendRoot(String),

    #[error("User id {user_id} is already registered by {owner}")]
    DuplicateUserId { user_id: String, owner: String },

    #[error("Host {host} is already registered by {owner}")]
    DuplicateHost { host: String, owner: String },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Refresh found no valid tenants ({errors} configuration errors), keeping previous registry")]
    NoTenants { errors: usize },
}

/// Carries no detail about what exists on disk.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("Not permitted")]
    NotPermitted,
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Invalid proxy target")]
    InvalidTarget { slug: String },

    #[error("Remote request to {slug} timed out")]
    Timeout { slug: String },

    #[error("Connection to {slug} failed: {message}")]
    Connection { slug: String, message: String },

    #[error("Request to {slug} failed: {message}")]
    Request { slug: String, message: String },

    #[error("User data file not found on {slug}")]
    NotFound { slug: String },

    #[error("Upstream {slug} returned {status}")]
    Upstream { slug: String, status: u16 },

    #[error("Remote data from {slug} is not valid JSON")]
    InvalidJson { slug: String },
}

impl RemoteError {
    pub fn slug(&self) -> &str {
        match self {
            RemoteError::InvalidTarget { slug }
            | RemoteError::Timeout { slug }
            | RemoteError::Connection { slug, .. }
            | RemoteError::Request { slug, .. }
            | RemoteError::NotFound { slug }
            | RemoteError::Upstream { slug, .. }
            | RemoteError::InvalidJson { slug } => slug,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::InvalidTarget { .. } => "invalid_target",
            RemoteError::Timeout { .. } => "timeout",
            RemoteError::Connection { .. } => "connection_error",
            RemoteError::Request { .. } => "request_error",
            RemoteError::NotFound { .. } => "not_found",
            RemoteError::Upstream { .. } => "upstream_error",
            RemoteError::InvalidJson { .. } => "invalid_json",
        }
    }
}
