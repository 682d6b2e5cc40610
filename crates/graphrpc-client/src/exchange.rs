//! The transport seam: one request body out, one response body back.

use crate::config::ClientConfig;
use graphrpc_common::auth::API_KEY_HEADER;
use graphrpc_common::protocol::{GraphRpcError, Result};
use graphrpc_common::transport::CONTENT_TYPE_JSON;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::future::Future;

/// Sends one encoded request and returns the encoded answer.
///
/// Transport failures must be reported as retryable errors
/// ([`GraphRpcError::is_retryable`]); everything above the transport lives
/// in the client.
pub trait Exchange: Send + Sync {
    /// Address used to key shared per-endpoint state.
    fn endpoint(&self) -> &str;

    fn post(&self, body: String) -> impl Future<Output = Result<String>> + Send;
}

/// HTTP POST exchange.
///
/// Connections are not kept alive between calls.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    url: String,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl HttpExchange {
    pub fn new(url: impl Into<String>, config: &ClientConfig) -> Result<Self> {
        let url = url.into();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| GraphRpcError::InvalidConfig(format!("api key: {}", e)))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .pool_max_idle_per_host(0);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| GraphRpcError::InvalidConfig(format!("proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| GraphRpcError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            url,
            timeout_ms: config.timeout.as_millis() as u64,
            client,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> GraphRpcError {
        if e.is_timeout() {
            GraphRpcError::Timeout(self.timeout_ms)
        } else {
            GraphRpcError::Transport(format!("{}: {}", self.url, e))
        }
    }
}

impl Exchange for HttpExchange {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn post(&self, body: String) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphRpcError::Transport(format!(
                "{} answered HTTP {}",
                self.url, status
            )));
        }

        response.text().await.map_err(|e| self.transport_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_exchange_creation() {
        let config = ClientConfig::new().api_key("secret");
        let exchange = HttpExchange::new("http://127.0.0.1:1", &config).unwrap();
        assert_eq!(exchange.endpoint(), "http://127.0.0.1:1");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let config = ClientConfig::new().api_key("bad\nkey");
        assert!(matches!(
            HttpExchange::new("http://127.0.0.1:1", &config),
            Err(GraphRpcError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable() {
        let config = ClientConfig::new().timeout(Duration::from_millis(500));
        // Port 1 is reserved and closed on test machines.
        let exchange = HttpExchange::new("http://127.0.0.1:1", &config).unwrap();
        let error = exchange.post("null".into()).await.unwrap_err();
        assert!(error.is_retryable());
    }
}
