//! # MSN Standard
//!
//! Multi-tenant resolution for client sites served from one backend.
//!
//! ## Layout
//!
//! ```text
//! clients/
//!   acme.com/
//!     frontend/
//!       msn_55512.json   <- exactly one manifest per client
//!       index.html
//!     data/
//!       orders.json      <- only readable if listed in backend_data
//! ```
//!
//! ## Manifest
//! - Named `msn_<userId>.json`, the user id comes from the filename only
//! - Must be a JSON object
//! - `backend_data`: filenames the backend may read/write for this client. Looked up at the
//!   top level, then under `MSS`
//! - `MSS.frontend_root`, `MSS.default_entry`: optional static serving overrides. The frontend
//!   root must stay inside the client directory and outside `data/`
//! - Everything else (compendium, dossier, ...) is opaque to the backend
//!
//!
//!
//! ## Registry
//! - Built once at startup from a scan of the clients root
//! - Published as a single `Arc` swap, readers never see a half-built map
//! - Refresh is serialized, a refresh that finds nothing keeps the old map
//! - A broken client is reported and skipped, the rest still serve
//! - A client's directory name always routes to that client, manifest `domains` can only add
//!   hosts nobody else owns
//!
//!
//!
//! ## Proxy
//! Remote manifests are always fetched live from the owner's domain. There is no cache and no
//! local copy to fall back to, every host serves its own canonical manifest.
pub mod error;
pub mod gate;
pub mod manifest;
pub mod remote;
pub mod tenants;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{GateError, RegistryError, RemoteError, ScanError};
pub use tenants::{RefreshReport, TenantMap, TenantRecord, TenantRegistry};
