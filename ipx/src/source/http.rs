//! Remote HTTP(S) origin supplier: host allow-listing, keep-alive
//! connection reuse, upstream freshness-header parsing (§4.2).
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::{SourceDescriptor, Supplier};
use crate::error::IpxError;

/// Fetches ids that carry a URL scheme. `reqwest::Client` pools keep-alive
/// connections internally (one pool per scheme), so a single shared client
/// instance is reused across every request, covering both the `http` and
/// `https` cases with one client.
pub struct HttpSupplier {
    client: reqwest::Client,
    allowed_hosts: Vec<String>,
    max_age: u32,
}

impl HttpSupplier {
    pub fn new(domains: &[String], max_age: u32) -> HttpSupplier {
        let allowed_hosts = domains
            .iter()
            .filter_map(|entry| {
                let with_scheme = if entry.contains("://") { entry.clone() } else { format!("http://{}", entry) };
                Url::parse(&with_scheme).ok().and_then(|u| u.host_str().map(|h| h.to_string()))
            })
            .collect();

        HttpSupplier { client: reqwest::Client::new(), allowed_hosts, max_age }
    }
}

#[async_trait]
impl Supplier for HttpSupplier {
    async fn resolve(&self, id: &str, bypass_domain: bool) -> Result<SourceDescriptor, IpxError> {
        let url = Url::parse(id).map_err(|_| IpxError::BadRequest(format!("Invalid URL: {}", id)))?;
        let host = url.host_str().ok_or_else(|| IpxError::Forbidden("Hostname is missing".to_string()))?;

        if !bypass_domain && !self.allowed_hosts.iter().any(|h| h == host) {
            return Err(IpxError::Forbidden("Forbidden host".to_string()));
        }

        tracing::debug!(url = %url, "fetching remote source");
        let response = self.client.get(url.clone()).send().await.map_err(|err| {
            IpxError::Upstream { status: err.status().map(|s| s.as_u16()).unwrap_or(500), reason: err.to_string() }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let reason = response.status().canonical_reason().unwrap_or("Upstream error").to_string();
            tracing::warn!(url = %url, status, "non-2xx response from upstream");
            return Err(IpxError::Upstream { status, reason });
        }

        let mut max_age = self.max_age;
        if let Some(cc) = response.headers().get(reqwest::header::CACHE_CONTROL).and_then(|v| v.to_str().ok()) {
            if let Some(n) = parse_max_age(cc) {
                max_age = n;
            }
        }
        let mtime: Option<SystemTime> = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| httpdate::parse_http_date(v).ok());

        let body = response.bytes().await.map_err(|err| IpxError::internal(err.to_string()))?;

        Ok(SourceDescriptor::new(mtime, Some(max_age), move || {
            let body = body.clone();
            async move { Ok::<Bytes, IpxError>(body) }
        }))
    }
}

fn parse_max_age(cache_control: &str) -> Option<u32> {
    cache_control.split(',').map(str::trim).find_map(|directive| {
        let (key, value) = directive.split_once('=')?;
        if key.eq_ignore_ascii_case("max-age") { value.trim().parse::<u32>().ok() } else { None }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_allow_list_hostnames() {
        let supplier = HttpSupplier::new(&["example.com".to_string(), "https://other.test".to_string()], 300);
        assert_eq!(supplier.allowed_hosts, vec!["example.com".to_string(), "other.test".to_string()]);
    }

    #[test]
    fn parses_max_age_directive() {
        assert_eq!(parse_max_age("public, max-age=120"), Some(120));
        assert_eq!(parse_max_age("no-store"), None);
    }

    #[tokio::test]
    async fn empty_allow_list_rejects_everything() {
        let supplier = HttpSupplier::new(&[], 300);
        let err = supplier.resolve("https://blocked.example/x.png", false).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
