//! Shared-secret authentication for the RPC endpoint.
//!
//! Clients send the key in the `X-API-Key` header; servers compare it in
//! constant time and answer 401 on mismatch. Authentication is off unless a
//! key is configured.

use hyper::HeaderMap;
use std::fmt;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Environment variable the CLI reads the key from when no flag is given.
pub const API_KEY_ENV: &str = "GRAPHRPC_API_KEY";

#[derive(Clone, Debug, Default)]
/// API key requirement of a server.
///
/// # Example
///
/// ```
/// use graphrpc_common::auth::AuthConfig;
///
/// let auth = AuthConfig::with_api_key("secret");
/// assert!(auth.requires_auth());
/// assert!(auth.validate_api_key("secret"));
/// assert!(!auth.validate_api_key("guess"));
/// ```
pub struct AuthConfig {
    api_key: Option<String>,
}

impl AuthConfig {
    /// Require `api_key` on every request.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }

    /// Accept every request.
    pub fn disabled() -> Self {
        Self { api_key: None }
    }

    /// Enabled when `api_key` is set and not blank.
    pub fn from_optional(api_key: Option<String>) -> Self {
        match api_key {
            Some(key) if !key.trim().is_empty() => Self::with_api_key(key),
            _ => Self::disabled(),
        }
    }

    pub fn requires_auth(&self) -> bool {
        self.api_key.is_some()
    }

    /// Checks a provided key. Always true when authentication is disabled.
    pub fn validate_api_key(&self, provided_key: &str) -> bool {
        match &self.api_key {
            Some(expected_key) => constant_time_eq(expected_key, provided_key),
            None => true,
        }
    }

    /// Checks the key carried by a request's headers.
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        if !self.requires_auth() {
            return true;
        }
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|key| self.validate_api_key(key))
    }
}

impl fmt::Display for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.api_key {
            Some(_) => write!(f, "ApiKey(*****)"),
            None => write!(f, "Disabled"),
        }
    }
}

/// Compares every byte regardless of where the first difference is.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}
