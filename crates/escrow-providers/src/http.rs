// crates/escrow-providers/src/http.rs
// ============================================================================
// Module: HTTP Endpoint
// Description: Shared outbound HTTP policy for oracle and ledger clients.
// Purpose: Enforce scheme, host, network, redirect, and size limits.
// Dependencies: reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`HttpEndpoint`] wraps a blocking `reqwest` client bound to one configured
//! base URL. Every request is a JSON `POST` issued under the same policy:
//! HTTPS unless cleartext is explicitly allowed, no embedded credentials,
//! optional host allowlist, private network targets blocked by default,
//! redirects disabled, and response bodies bounded by `max_response_bytes`.
//! Remote responses are untrusted and fail closed on any limit violation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::io::Read;
use std::net::IpAddr;
use std::net::ToSocketAddrs;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for an outbound HTTP endpoint.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - If `allowed_hosts` is set, only listed hosts are permitted.
/// - `allow_private_networks = false` blocks private/link-local/loopback targets.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Base URL of the remote service.
    pub endpoint: String,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// Allow requests to private/link-local/loopback addresses.
    pub allow_private_networks: bool,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            allow_http: false,
            timeout_ms: 10_000,
            max_response_bytes: 1024 * 1024,
            allowed_hosts: None,
            allow_private_networks: false,
            user_agent: "quorum-escrow/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by outbound HTTP calls.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Configuration or URL policy violation.
    #[error("http policy violation: {0}")]
    Policy(String),
    /// Request could not be delivered or no response was read.
    #[error("http transport failure: {0}")]
    Transport(String),
    /// Response body violated limits or could not be decoded.
    #[error("http response invalid: {0}")]
    Response(String),
}

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// Raw reply from a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Bounded response body.
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Response`] when the body is not the expected JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body)
            .map_err(|err| HttpError::Response(format!("invalid json body: {err}")))
    }

    /// Returns a short, lossy excerpt of the body for error messages.
    #[must_use]
    pub fn excerpt(&self) -> String {
        const MAX_EXCERPT: usize = 256;
        let end = self.body.len().min(MAX_EXCERPT);
        String::from_utf8_lossy(&self.body[..end]).trim().to_string()
    }
}

/// Policy-bound HTTP client for one remote service.
///
/// # Invariants
/// - `base` passed URL policy checks at construction.
/// - Redirects are never followed.
pub struct HttpEndpoint {
    /// Endpoint configuration, including limits and policy.
    config: HttpClientConfig,
    /// Validated base URL.
    base: Url,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpEndpoint {
    /// Creates an endpoint after validating the configured URL.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Policy`] when the URL or limits are invalid and
    /// [`HttpError::Transport`] when the client cannot be built.
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        if config.timeout_ms == 0 {
            return Err(HttpError::Policy("timeout_ms must be greater than zero".to_string()));
        }
        if config.max_response_bytes == 0 {
            return Err(HttpError::Policy(
                "max_response_bytes must be greater than zero".to_string(),
            ));
        }
        let base = Url::parse(config.endpoint.trim())
            .map_err(|_| HttpError::Policy("invalid endpoint url".to_string()))?;
        validate_url(&base, &config)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| HttpError::Transport("http client build failed".to_string()))?;
        Ok(Self {
            config,
            base,
            client,
        })
    }

    /// Returns the validated base URL.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Builds a URL by appending path segments to the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Policy`] when the base URL cannot carry a path.
    pub fn url_for(&self, segments: &[&str]) -> Result<Url, HttpError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| HttpError::Policy("endpoint url cannot be a base".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Posts a JSON body and returns the bounded reply.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on policy violations, transport failures,
    /// redirects, or oversize responses.
    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &Url,
        body: &T,
        headers: &[(&str, &str)],
    ) -> Result<HttpReply, HttpError> {
        enforce_resolved_policy(url, &self.config)?;
        let payload = serde_json::to_vec(body)
            .map_err(|err| HttpError::Policy(format!("request serialization failed: {err}")))?;
        let mut request =
            self.client.post(url.as_str()).header(CONTENT_TYPE, "application/json").body(payload);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let mut response = request.send().map_err(|err| {
            if err.is_timeout() {
                HttpError::Transport("http request timed out".to_string())
            } else {
                HttpError::Transport("http request failed".to_string())
            }
        })?;
        if response.status().is_redirection() || response.url() != url {
            return Err(HttpError::Policy("http redirect not allowed".to_string()));
        }
        let status = response.status().as_u16();
        let body = read_response_limited(&mut response, self.config.max_response_bytes)?;
        Ok(HttpReply {
            status,
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates URL scheme, credentials, and allowlist policy.
fn validate_url(url: &Url, config: &HttpClientConfig) -> Result<(), HttpError> {
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        _ => return Err(HttpError::Policy("unsupported url scheme".to_string())),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(HttpError::Policy("url credentials are not allowed".to_string()));
    }
    let host =
        url.host_str().ok_or_else(|| HttpError::Policy("url host required".to_string()))?;
    if let Some(allowlist) = &config.allowed_hosts {
        let host = normalize_host_label(host);
        let allowed = allowlist.iter().any(|entry| normalize_host_label(entry.as_str()) == host);
        if !allowed {
            return Err(HttpError::Policy("url host not allowed".to_string()));
        }
    }
    Ok(())
}

/// Resolves the request host and rejects private targets when disallowed.
fn enforce_resolved_policy(url: &Url, config: &HttpClientConfig) -> Result<(), HttpError> {
    if config.allow_private_networks {
        return Ok(());
    }
    let host =
        url.host_str().ok_or_else(|| HttpError::Policy("url host required".to_string()))?;
    let host_for_resolution =
        host.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(host);
    let port = url
        .port_or_known_default()
        .ok_or_else(|| HttpError::Policy("url port required".to_string()))?;
    let ips = resolve_host_ips(host_for_resolution, port)?;
    if ips.is_empty() {
        return Err(HttpError::Transport("url host has no resolved addresses".to_string()));
    }
    if ips.iter().any(is_private_or_link_local) {
        return Err(HttpError::Policy(format!(
            "url host resolves to private or link-local address: {}",
            normalize_host_label(host)
        )));
    }
    Ok(())
}

/// Resolves hostnames to peer IPs used for policy checks.
fn resolve_host_ips(host: &str, port: u16) -> Result<Vec<IpAddr>, HttpError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }
    (host, port)
        .to_socket_addrs()
        .map(|iter| iter.map(|addr| addr.ip()).collect())
        .map_err(|_| HttpError::Transport("url host resolution failed".to_string()))
}

/// Returns true when an IP is private, loopback, link-local, or otherwise local.
#[allow(
    clippy::option_if_let_else,
    reason = "Option::map_or is not const-callable on current toolchain."
)]
const fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_private()
                || addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
                || addr.is_broadcast()
        }
        IpAddr::V6(addr) => {
            let mapped_private = if let Some(mapped) = addr.to_ipv4_mapped() {
                mapped.is_private() || mapped.is_loopback() || mapped.is_link_local()
            } else {
                false
            };
            mapped_private
                || addr.is_loopback()
                || addr.is_unique_local()
                || addr.is_unicast_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
        }
    }
}

/// Normalizes host labels for allowlist comparisons.
fn normalize_host_label(host: &str) -> String {
    let trimmed = host.trim_end_matches('.');
    let trimmed =
        trimmed.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(trimmed);
    trimmed.to_ascii_lowercase()
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, HttpError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| HttpError::Response("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(HttpError::Response("http response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle
        .read_to_end(&mut buf)
        .map_err(|_| HttpError::Transport("failed to read response".to_string()))?;
    if buf.len() > max_bytes {
        return Err(HttpError::Response("http response exceeds size limit".to_string()));
    }
    if let Some(expected) = expected_len
        && u64::try_from(buf.len()).ok().is_none_or(|actual| actual < expected)
    {
        return Err(HttpError::Transport("http response truncated".to_string()));
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    fn config(endpoint: &str) -> HttpClientConfig {
        HttpClientConfig {
            endpoint: endpoint.to_string(),
            ..HttpClientConfig::default()
        }
    }

    #[test]
    fn cleartext_requires_opt_in() {
        let cleartext = HttpEndpoint::new(config("http://ledger.test"));
        assert!(matches!(cleartext, Err(HttpError::Policy(_))));
        let allowed = HttpClientConfig {
            allow_http: true,
            ..config("http://ledger.test")
        };
        assert!(HttpEndpoint::new(allowed).is_ok());
    }

    #[test]
    fn credentials_and_unknown_schemes_are_rejected() {
        assert!(HttpEndpoint::new(config("https://user:pw@ledger.test")).is_err());
        assert!(HttpEndpoint::new(config("ftp://ledger.test")).is_err());
        assert!(HttpEndpoint::new(config("not a url")).is_err());
    }

    #[test]
    fn allowlist_is_case_insensitive() {
        let mut hosts = BTreeSet::new();
        hosts.insert("Ledger.Test.".to_string());
        let allowed = HttpClientConfig {
            allowed_hosts: Some(hosts),
            ..config("https://ledger.test/api")
        };
        assert!(HttpEndpoint::new(allowed.clone()).is_ok());
        let denied = HttpClientConfig {
            endpoint: "https://other.test".to_string(),
            ..allowed
        };
        assert!(matches!(HttpEndpoint::new(denied), Err(HttpError::Policy(_))));
    }

    #[test]
    fn url_for_appends_segments() {
        let endpoint = HttpEndpoint::new(config("https://ledger.test/api/")).unwrap();
        assert_eq!(
            endpoint.url_for(&["release"]).unwrap().as_str(),
            "https://ledger.test/api/release"
        );
        let bare = HttpEndpoint::new(config("https://ledger.test")).unwrap();
        assert_eq!(bare.url_for(&["approve"]).unwrap().as_str(), "https://ledger.test/approve");
    }

    #[test]
    fn private_targets_are_blocked_by_default() {
        let endpoint = HttpEndpoint::new(config("https://127.0.0.1:9")).unwrap();
        let url = endpoint.url_for(&["release"]).unwrap();
        let err = endpoint.post_json(&url, &serde_json::json!({}), &[]).unwrap_err();
        assert!(matches!(err, HttpError::Policy(_)));
    }
}
