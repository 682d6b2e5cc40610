//! # GraphRPC CLI
//!
//! Helpers behind the `graphrpc` binary:
//!
//! - `graphrpc serve`: run the dispatcher over an in-memory store
//! - `graphrpc ping | action | count | retrieve`: one client call each
//!
//! Client subcommands share the retry, timeout, proxy and API key flags
//! gathered in [`ClientOptions`].

pub mod demo;

use anyhow::{bail, Result};
use graphrpc_client::{ClientConfig, GraphRpcClient, RetryConfig};
use graphrpc_common::auth::API_KEY_ENV;
use std::time::Duration;

/// Validates that a URL string starts with http:// or https://
pub fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        bail!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        )
    }
}

/// The flag value if given, otherwise `GRAPHRPC_API_KEY`. Blank keys count
/// as absent.
pub fn resolve_api_key(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub retries: u32,
    pub backoff_ms: u64,
    pub timeout_ms: u64,
    pub fault_tolerant: bool,
    pub proxy: Option<String>,
    pub api_key: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_ms: 1000,
            timeout_ms: 30_000,
            fault_tolerant: false,
            proxy: None,
            api_key: None,
        }
    }
}

impl ClientOptions {
    pub fn config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::new()
            .retry(RetryConfig::new(self.retries, self.backoff_ms)?)
            .timeout(Duration::from_millis(self.timeout_ms))
            .fault_tolerant(self.fault_tolerant);
        if let Some(proxy) = &self.proxy {
            validate_http_url(proxy, "proxy")?;
            config = config.proxy(proxy.clone());
        }
        if let Some(key) = &self.api_key {
            config = config.api_key(key.clone());
        }
        Ok(config)
    }

    /// A client for `url` speaking the demo domain.
    pub fn connect(&self, url: &str) -> Result<GraphRpcClient> {
        validate_http_url(url, "server address")?;
        Ok(GraphRpcClient::with_config(url, demo::registry(), self.config()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://127.0.0.1:8080", "server address").is_ok());
        assert!(validate_http_url("https://example.com", "server address").is_ok());

        let error = validate_http_url("127.0.0.1:8080", "server address").unwrap_err();
        assert!(error.to_string().contains("must start with http://"));
    }

    #[test]
    fn test_api_key_flag_wins() {
        assert_eq!(resolve_api_key(Some("flag".into())).as_deref(), Some("flag"));
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        std::env::remove_var(API_KEY_ENV);
        assert_eq!(resolve_api_key(Some("   ".into())), None);
        assert_eq!(resolve_api_key(None), None);
    }

    #[test]
    fn test_client_options() {
        let options = ClientOptions {
            retries: 0,
            fault_tolerant: true,
            ..ClientOptions::default()
        };
        let client = options.connect("http://127.0.0.1:8080").unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8080");

        assert!(options.connect("127.0.0.1:8080").is_err());

        let slow = ClientOptions {
            backoff_ms: 120_000,
            ..ClientOptions::default()
        };
        assert!(slow.config().is_err());

        let proxied = ClientOptions {
            proxy: Some("socks".into()),
            ..ClientOptions::default()
        };
        assert!(proxied.config().is_err());
    }
}
