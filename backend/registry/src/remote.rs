use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use reqwest::{Client, StatusCode, redirect::Policy};
use serde_json::Value;
use tracing::{info, warn};

use crate::{error::RemoteError, manifest::parse_manifest_name};

static SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?(?::[0-9]{1,5})?$").unwrap()
});

/// Host name with an optional port, as used in `/proxy/<slug>/...`.
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG.is_match(slug)
}

/// Fetches other tenants' manifests live from their own domain. One attempt per call, no
/// cache, no local fallback. Redirects are not followed, a 3xx is an upstream error.
pub struct RemoteFetcher {
    client: Client,
    scheme: String,
}

impl RemoteFetcher {
    pub fn new(
        scheme: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            scheme: scheme.to_string(),
        })
    }

    pub fn url_for(&self, slug: &str, filename: &str) -> String {
        format!("{}://{slug}/{filename}", self.scheme)
    }

    pub async fn fetch_manifest(&self, slug: &str, filename: &str) -> Result<Value, RemoteError> {
        if !is_valid_slug(slug) || parse_manifest_name(filename).is_none() {
            return Err(RemoteError::InvalidTarget {
                slug: slug.to_string(),
            });
        }

        let url = self.url_for(slug, filename);
        info!("Fetching remote manifest {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(slug, e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(RemoteError::NotFound {
                    slug: slug.to_string(),
                });
            }
            status => {
                warn!("Upstream {url} returned {status}");

                return Err(RemoteError::Upstream {
                    slug: slug.to_string(),
                    status: status.as_u16(),
                });
            }
        }

        let bytes = response.bytes().await.map_err(|e| classify(slug, e))?;

        serde_json::from_slice(&bytes).map_err(|_| RemoteError::InvalidJson {
            slug: slug.to_string(),
        })
    }
}

fn classify(slug: &str, error: reqwest::Error) -> RemoteError {
    let slug = slug.to_string();

    if error.is_timeout() {
        RemoteError::Timeout { slug }
    } else if error.is_connect() {
        RemoteError::Connection {
            slug,
            message: error.to_string(),
        }
    } else {
        RemoteError::Request {
            slug,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_host_names() {
        assert!(is_valid_slug("acme.com"));
        assert!(is_valid_slug("www.acme-shop.co.uk"));
        assert!(is_valid_slug("127.0.0.1:8080"));

        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("acme.com/evil"));
        assert!(!is_valid_slug("user@acme.com"));
        assert!(!is_valid_slug(".acme.com"));
        assert!(!is_valid_slug("acme.com:"));
    }

    #[test]
    fn urls_use_the_configured_scheme() {
        let fetcher =
            RemoteFetcher::new("https", Duration::from_secs(10), Duration::from_secs(5)).unwrap();

        assert_eq!(
            fetcher.url_for("acme.com", "msn_1.json"),
            "https://acme.com/msn_1.json"
        );
    }

    #[tokio::test]
    async fn invalid_targets_never_leave_the_process() {
        let fetcher =
            RemoteFetcher::new("https", Duration::from_secs(10), Duration::from_secs(5)).unwrap();

        for (slug, filename) in [
            ("acme.com/x", "msn_1.json"),
            ("acme.com", "secrets.json"),
            ("acme.com", "msn_../x.json"),
        ] {
            let error = fetcher.fetch_manifest(slug, filename).await.unwrap_err();
            assert!(matches!(error, RemoteError::InvalidTarget { .. }));
            assert_eq!(error.slug(), slug);
        }
    }
}
