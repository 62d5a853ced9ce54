//! # Backend Data Gate
//!
//! A tenant may only touch the files its own manifest lists under `backend_data`.
//!
//! - Anything that is not a single plain path component is rejected first
//! - Then exact, case sensitive match against the whitelist, no canonicalization
//! - Every rejection is the same [`GateError::NotPermitted`]
use std::path::{Component, Path, PathBuf};

use crate::{error::GateError, tenants::TenantRecord};

/// Returns the path of `filename` in the tenant's data directory if the manifest allows it.
pub fn check(tenant: &TenantRecord, filename: &str) -> Result<PathBuf, GateError> {
    if !is_plain_filename(filename) {
        return Err(GateError::NotPermitted);
    }

    if !tenant
        .allowed_data_files
        .iter()
        .any(|allowed| allowed == filename)
    {
        return Err(GateError::NotPermitted);
    }

    Ok(tenant.data_dir.join(filename))
}

fn is_plain_filename(filename: &str) -> bool {
    if filename.is_empty() || filename.contains(['/', '\\', '\0']) {
        return false;
    }

    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::PathBuf};

    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        testing::{manifest_with, write_client},
        tenants::TenantRegistry,
    };

    fn tenant(backend_data: &[&str]) -> TenantRecord {
        TenantRecord {
            user_id: "55512".to_string(),
            domains: vec!["acme.com".to_string()],
            client_root: PathBuf::from("/clients/acme.com"),
            frontend_root: PathBuf::from("/clients/acme.com/frontend"),
            manifest_path: PathBuf::from("/clients/acme.com/frontend/msn_55512.json"),
            data_dir: PathBuf::from("/clients/acme.com/data"),
            default_entry: "index.html".to_string(),
            allowed_data_files: backend_data.iter().map(|s| s.to_string()).collect(),
            manifest: json!({ "backend_data": backend_data }),
        }
    }

    #[test]
    fn whitelist_is_exact() {
        let tenant = tenant(&["products.json", "inventory.json"]);

        assert_eq!(
            check(&tenant, "products.json"),
            Ok(PathBuf::from("/clients/acme.com/data/products.json"))
        );
        assert_eq!(
            check(&tenant, "inventory.json"),
            Ok(PathBuf::from("/clients/acme.com/data/inventory.json"))
        );

        for rejected in [
            "../secrets.json",
            "products.json/../../secrets.json",
            "Products.json",
            "products.json ",
            "orders.json",
            "",
        ] {
            assert_eq!(check(&tenant, rejected), Err(GateError::NotPermitted), "{rejected}");
        }
    }

    #[test]
    fn traversal_is_rejected_even_when_whitelisted() {
        let tenant = tenant(&["../etc/passwd", "a/b.json", "..", ".", "c\\d.json"]);

        for name in ["../etc/passwd", "a/b.json", "..", ".", "c\\d.json", "/etc/passwd"] {
            assert_eq!(check(&tenant, name), Err(GateError::NotPermitted), "{name}");
        }
    }

    #[test]
    fn dots_inside_a_name_are_fine() {
        let tenant = tenant(&["report..2024.json"]);

        assert!(check(&tenant, "report..2024.json").is_ok());
    }

    #[test]
    fn rejections_look_the_same() {
        let tenant = tenant(&["orders.json"]);

        let traversal = check(&tenant, "../etc/passwd").unwrap_err();
        let unlisted = check(&tenant, "inventory.json").unwrap_err();

        assert_eq!(traversal, unlisted);
        assert_eq!(traversal.to_string(), "Not permitted");
    }

    #[test]
    fn scanned_tenant_scenario() {
        let root = tempdir().unwrap();
        write_client(
            root.path(),
            "acme.com",
            &[("msn_55512.json", r#"{"backend_data": ["orders.json"]}"#)],
        );
        write_client(
            root.path(),
            "rival.com",
            &[("msn_777.json", manifest_with(&["ledger.json"]).as_str())],
        );

        let registry = TenantRegistry::new(root.path(), HashMap::new());
        registry.load();

        let acme = registry.resolve_by_host("acme.com").unwrap();
        assert_eq!(acme.user_id, "55512");
        assert_eq!(
            check(&acme, "orders.json"),
            Ok(root.path().join("acme.com/data/orders.json"))
        );
        assert_eq!(check(&acme, "../etc/passwd"), Err(GateError::NotPermitted));
        assert_eq!(check(&acme, "inventory.json"), Err(GateError::NotPermitted));
        assert_eq!(check(&acme, "ledger.json"), Err(GateError::NotPermitted));

        let rival = registry.resolve_by_host("rival.com").unwrap();
        assert_eq!(check(&rival, "orders.json"), Err(GateError::NotPermitted));
        assert!(check(&rival, "ledger.json").is_ok());
    }
}
