//! Scans a clients root the same way the server does at startup and prints what it found.
//!
//! Exits non-zero when any client has a configuration error.
use std::{collections::HashMap, path::PathBuf};

use anyhow::bail;
use clap::Parser;
use registry::TenantRegistry;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding one subdirectory per client
    clients_root: PathBuf,

    /// Extra `host=client` routes, same format as HOST_ALIASES
    #[arg(long, value_parser = parse_alias)]
    alias: Vec<(String, String)>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_alias(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(host, client)| (host.trim().to_string(), client.trim().to_string()))
        .filter(|(host, client)| !host.is_empty() && !client.is_empty())
        .ok_or_else(|| format!("expected host=client, got {raw:?}"))
}

fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let aliases: HashMap<String, String> = args.alias.into_iter().collect();
    let registry = TenantRegistry::new(&args.clients_root, aliases);
    let report = registry.load();

    if args.json {
        println!("{}", serde_json::to_string_pretty(report.as_ref())?);
    } else {
        for tenant in registry.list() {
            println!(
                "{}\t{}\tbackend_data=[{}]",
                tenant.user_id,
                tenant.domains.join(","),
                tenant.allowed_data_files.join(",")
            );
        }

        for entry in &report.errors {
            eprintln!("{}: {}", entry.client, entry.error);
        }
    }

    if !report.errors.is_empty() {
        bail!(
            "{} of {} clients have configuration errors",
            report.errors.len(),
            report.errors.len() + report.tenants.len()
        );
    }

    Ok(())
}
