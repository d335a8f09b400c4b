//! System proxy discovery from the conventional environment variables.

use tracing::info;
use url::Url;

use crate::session::{Protocol, Session};

/// Proxy configuration resolved from the environment for one session.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Proxy URL matching the session's protocol.
    pub proxy_url: Url,
}

impl ProxySettings {
    /// Resolves the system proxy for the session, honoring `NO_PROXY`.
    ///
    /// `HTTPS_PROXY`/`https_proxy` applies to https sessions and
    /// `HTTP_PROXY`/`http_proxy` to http sessions. Returns `None` when no
    /// variable is set, the value is not a valid URL, or the session host
    /// matches a `NO_PROXY` entry.
    pub fn system_proxy(session: &Session) -> Option<Self> {
        if Self::matches_no_proxy(session) {
            return None;
        }
        let value = match session.protocol {
            Protocol::Https => env_either("HTTPS_PROXY", "https_proxy"),
            Protocol::Http => env_either("HTTP_PROXY", "http_proxy"),
        }?;
        let proxy_url = Url::parse(&value).ok()?;
        info!(proxy = %proxy_url, host = %session.hostname, "using system proxy");
        Some(Self { proxy_url })
    }

    /// Whether the session host matches a `NO_PROXY`/`no_proxy` entry.
    ///
    /// Entries are comma-separated and match as hostname suffixes, so
    /// `example.com` covers `api.example.com`.
    pub fn matches_no_proxy(session: &Session) -> bool {
        let Some(value) = env_either("NO_PROXY", "no_proxy") else {
            return false;
        };
        value
            .split(',')
            .map(|entry| entry.trim().to_lowercase())
            .filter(|entry| !entry.is_empty())
            .any(|entry| session.hostname.to_lowercase().ends_with(&entry))
    }
}

fn env_either(upper: &str, lower: &str) -> Option<String> {
    std::env::var(upper)
        .or_else(|_| std::env::var(lower))
        .ok()
        .filter(|value| !value.trim().is_empty())
}
