//! Outbound-network policy and the HTTP client boundary.
//!
//! The interpreter never opens sockets itself; the `requests` module asks
//! the context, which checks the policy and delegates to a host-supplied
//! `HttpClient`. A `None` policy denies everything.

use serde::{Deserialize, Serialize};

/// Policy governing outgoing HTTP requests.
///
/// A request is admitted when its method is allowed **and** the URL's host
/// exactly matches a listed host (case-insensitive) **or** the URL starts
/// with a listed prefix. Empty host and prefix lists deny everything. The
/// host match is exact against the parsed authority, so subdomains and
/// path-based spoofing (`https://evil.com/api.example.com`) are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPolicy {
    pub allowed_hosts: Vec<String>,
    pub allowed_url_prefixes: Vec<String>,
    /// Uppercase method names; defaults to `["GET", "HEAD"]`.
    pub allowed_methods: Vec<String>,
    /// Bypasses every check. The name is the warning.
    pub dangerously_allow_full_internet_access: bool,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            allowed_url_prefixes: Vec::new(),
            allowed_methods: vec!["GET".to_string(), "HEAD".to_string()],
            dangerously_allow_full_internet_access: false,
        }
    }
}

impl NetworkPolicy {
    /// Convenience policy admitting GET/HEAD to the given hosts.
    #[must_use]
    pub fn for_hosts(hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Checks a request; `Err` carries the denial reason.
    pub fn admits(&self, method: &str, url: &str) -> Result<(), String> {
        if self.dangerously_allow_full_internet_access {
            return Ok(());
        }
        let method = method.to_uppercase();
        if !self.allowed_methods.iter().any(|m| m.eq_ignore_ascii_case(&method)) {
            return Err(format!("method {method} is not allowed by the network policy"));
        }
        let host = url_host(url);
        let host_ok = host
            .as_deref()
            .is_some_and(|h| self.allowed_hosts.iter().any(|a| a.eq_ignore_ascii_case(h)));
        let prefix_ok = self.allowed_url_prefixes.iter().any(|p| url.starts_with(p.as_str()));
        if host_ok || prefix_ok {
            Ok(())
        } else {
            Err(format!("URL '{url}' is not allowed by the network policy"))
        }
    }
}

/// Extracts the hostname from a URL: authority between `scheme://` and the
/// first `/`, `?` or `#`, with userinfo and port stripped, lowercased.
pub(crate) fn url_host(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    // strip a port, but not the closing bracket of an IPv6 literal
    let host = if host.starts_with('[') {
        host.split_once(']').map_or(host, |(h, _)| &h[1..])
    } else {
        host.rsplit_once(':').map_or(host, |(h, _)| h)
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// An outgoing request as the `requests` module assembles it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// The host-visible response, also the replay payload for `http` effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// The transport the host plugs in. Blocking; the compute clock is paused
/// around each call.
pub trait HttpClient {
    fn request(&mut self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Serializable form of a transport outcome, used as the replay payload for
/// `http` side-effect events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum HttpOutcome {
    Ok(HttpResponse),
    Err(String),
}

impl From<Result<HttpResponse, String>> for HttpOutcome {
    fn from(result: Result<HttpResponse, String>) -> Self {
        match result {
            Ok(response) => Self::Ok(response),
            Err(message) => Self::Err(message),
        }
    }
}

impl HttpOutcome {
    pub(crate) fn into_result(self) -> Result<HttpResponse, String> {
        match self {
            Self::Ok(response) => Ok(response),
            Self::Err(message) => Err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_equivalent_policy_denies() {
        let policy = NetworkPolicy::default();
        assert!(policy.admits("GET", "https://example.com/x").is_err());
    }

    #[test]
    fn exact_host_match_only() {
        let policy = NetworkPolicy::for_hosts(["api.example.com"]);
        assert!(policy.admits("GET", "https://api.example.com/v1").is_ok());
        assert!(policy.admits("GET", "https://API.EXAMPLE.COM/v1").is_ok());
        // subdomain and path-spoofing rejected
        assert!(policy.admits("GET", "https://sub.api.example.com/").is_err());
        assert!(policy.admits("GET", "https://evil.com/api.example.com").is_err());
        // port does not defeat the match
        assert!(policy.admits("GET", "https://api.example.com:8443/v1").is_ok());
    }

    #[test]
    fn method_gate_applies_before_url() {
        let policy = NetworkPolicy::for_hosts(["api.example.com"]);
        assert!(policy.admits("POST", "https://api.example.com/v1").is_err());
        let mut policy = policy;
        policy.allowed_methods.push("POST".to_string());
        assert!(policy.admits("POST", "https://api.example.com/v1").is_ok());
    }

    #[test]
    fn prefix_match() {
        let policy = NetworkPolicy {
            allowed_url_prefixes: vec!["https://cdn.example.com/public/".to_string()],
            ..NetworkPolicy::default()
        };
        assert!(policy.admits("GET", "https://cdn.example.com/public/a.json").is_ok());
        assert!(policy.admits("GET", "https://cdn.example.com/private/a.json").is_err());
    }

    #[test]
    fn bypass_flag_admits_everything() {
        let policy = NetworkPolicy {
            dangerously_allow_full_internet_access: true,
            ..NetworkPolicy::default()
        };
        assert!(policy.admits("DELETE", "https://anything.invalid/x").is_ok());
    }

    #[test]
    fn host_extraction() {
        assert_eq!(url_host("https://User@Example.COM:443/p?q"), Some("example.com".into()));
        assert_eq!(url_host("http://x"), Some("x".into()));
        assert_eq!(url_host("not a url"), None);
    }
}
