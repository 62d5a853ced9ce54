use std::{fs, path::Path};

use serde_json::{Value, json};

/// Writes `<root>/<client>/frontend/<name>` for each file, creating directories as needed.
pub fn write_client(root: &Path, client: &str, files: &[(&str, &str)]) {
    let frontend = root.join(client).join("frontend");
    fs::create_dir_all(&frontend).unwrap();

    for (name, contents) in files {
        fs::write(frontend.join(name), contents).unwrap();
    }
}

pub fn manifest_with(backend_data: &[&str]) -> String {
    let manifest: Value = json!({
        "compendium": { "title": "Example" },
        "backend_data": backend_data,
    });

    manifest.to_string()
}
