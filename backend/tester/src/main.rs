//! Writes a small clients tree for running the server locally.
use std::{env, fs, path::PathBuf};

use serde_json::json;

fn main() -> anyhow::Result<()> {
    let root = PathBuf::from(env::args().nth(1).unwrap_or_else(|| "../clients".to_string()));

    let frontend = root.join("example.com/frontend");
    let data = root.join("example.com/data");
    fs::create_dir_all(&frontend)?;
    fs::create_dir_all(&data)?;

    let manifest = json!({
        "compendium": { "title": "Example Co." },
        "dossier": { "name": "Example", "city": "Nowhere" },
        "backend_data": ["products.json", "inventory.json"],
        "MSS": { "default_entry": "index.html" }
    });

    fs::write(
        frontend.join("msn_55512.json"),
        serde_json::to_vec_pretty(&manifest)?,
    )?;
    fs::write(frontend.join("index.html"), "<h1>Example Co.</h1>\n")?;
    fs::write(
        data.join("products.json"),
        serde_json::to_vec_pretty(&json!({ "products": [{ "sku": "A-1", "price": 4.5 }] }))?,
    )?;

    println!("Wrote sample client to {}", root.display());

    Ok(())
}
