use std::{
    collections::HashMap, env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr,
    time::Duration,
};

use tracing::{info, warn};

use crate::error::ConfigError;

pub const DEFAULT_PORT: &str = "5000";
pub const DEFAULT_CLIENTS_ROOT: &str = "/srv/webapps/clients";
pub const DEFAULT_PROXY_SCHEME: &str = "https";
pub const DEFAULT_PROXY_TIMEOUT_SECS: &str = "10";
pub const DEFAULT_PROXY_CONNECT_TIMEOUT_SECS: &str = "5";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub clients_root: PathBuf,
    pub default_client: Option<String>,
    pub host_aliases: HashMap<String, String>,
    pub proxy_scheme: String,
    pub proxy_timeout: Duration,
    pub proxy_connect_timeout: Duration,
    pub refresh_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("RUST_PORT", DEFAULT_PORT)?,
            clients_root: try_load("CLIENTS_ROOT", DEFAULT_CLIENTS_ROOT)?,
            default_client: optional("DEFAULT_CLIENT_SLUG"),
            host_aliases: parse_aliases(&optional("HOST_ALIASES").unwrap_or_default())?,
            proxy_scheme: parse_scheme(&try_load::<String>("PROXY_SCHEME", DEFAULT_PROXY_SCHEME)?)?,
            proxy_timeout: Duration::from_secs(try_load(
                "PROXY_TIMEOUT_SECS",
                DEFAULT_PROXY_TIMEOUT_SECS,
            )?),
            proxy_connect_timeout: Duration::from_secs(try_load(
                "PROXY_CONNECT_TIMEOUT_SECS",
                DEFAULT_PROXY_CONNECT_TIMEOUT_SECS,
            )?),
            refresh_token: read_secret("REFRESH_TOKEN"),
        })
    }

    /// Defaults for everything except where the clients live.
    pub fn with_clients_root(clients_root: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            clients_root: clients_root.into(),
            default_client: None,
            host_aliases: HashMap::new(),
            proxy_scheme: DEFAULT_PROXY_SCHEME.to_string(),
            proxy_timeout: Duration::from_secs(10),
            proxy_connect_timeout: Duration::from_secs(5),
            refresh_token: None,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found, using default");
    })
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
}

/// `host=client,host2=client2`
pub fn parse_aliases(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((host, client)) if !host.trim().is_empty() && !client.trim().is_empty() => {
                Ok((host.trim().to_string(), client.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidAlias(pair.to_string())),
        })
        .collect()
}

fn parse_scheme(scheme: &str) -> Result<String, ConfigError> {
    match scheme {
        "http" | "https" => Ok(scheme.to_string()),
        other => Err(ConfigError::InvalidScheme(other.to_string())),
    }
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Secret {secret_name} not available, related endpoints disabled: {e}");
        })
        .ok()
        .filter(|secret| !secret.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_parse() {
        let aliases = parse_aliases(" localhost=acme.com, www.acme.com = acme.com ,").unwrap();

        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases["localhost"], "acme.com");
        assert_eq!(aliases["www.acme.com"], "acme.com");

        assert!(parse_aliases("").unwrap().is_empty());
        assert!(matches!(
            parse_aliases("localhost"),
            Err(ConfigError::InvalidAlias(_))
        ));
        assert!(matches!(
            parse_aliases("=acme.com"),
            Err(ConfigError::InvalidAlias(_))
        ));
    }

    #[test]
    fn only_http_schemes() {
        assert_eq!(parse_scheme("https").unwrap(), "https");
        assert_eq!(parse_scheme("http").unwrap(), "http");
        assert!(parse_scheme("ftp").is_err());
    }
}
