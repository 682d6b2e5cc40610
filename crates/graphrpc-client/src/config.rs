//! Client configuration.

use crate::container_cache::ContainerCaches;
use graphrpc_common::directory::{NoDirectory, UserDirectory};
use graphrpc_common::protocol::{GraphRpcError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound accepted for a single backoff step.
const MAX_BACKOFF_STEP_MS: u64 = 60_000;

/// Retry policy for transport failures.
///
/// A call that fails at the transport level is attempted again up to
/// `retries` times. Before retry number `n` the client sleeps
/// `n * backoff_step`, so waits grow linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retry attempts after the initial one.
    ///
    /// Total attempts = retries + 1
    /// Default: 3
    pub retries: u32,
    /// Default: 1s
    pub backoff_step: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Create a retry policy
    ///
    /// # Arguments
    ///
    /// * `retries` - Attempts after the first one
    /// * `backoff_step_ms` - Wait before the first retry, in milliseconds
    ///
    /// # Returns
    ///
    /// `InvalidConfig` when the step exceeds one minute
    pub fn new(retries: u32, backoff_step_ms: u64) -> Result<Self> {
        if backoff_step_ms > MAX_BACKOFF_STEP_MS {
            return Err(GraphRpcError::InvalidConfig(format!(
                "backoff step {}ms exceeds {}ms",
                backoff_step_ms, MAX_BACKOFF_STEP_MS
            )));
        }
        Ok(Self {
            retries,
            backoff_step: Duration::from_millis(backoff_step_ms),
        })
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff_step: Duration::ZERO,
        }
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Everything a [`GraphRpcClient`](crate::GraphRpcClient) needs besides its
/// endpoint and type registry.
#[derive(Clone)]
pub struct ClientConfig {
    pub retry: RetryConfig,
    /// Degrade read-style calls to default results instead of failing.
    pub fault_tolerant: bool,
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub api_key: Option<String>,
    /// Resolves user-typed fields in decoded objects.
    pub user_directory: Arc<dyn UserDirectory>,
    pub container_caches: ContainerCaches,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            fault_tolerant: false,
            timeout: Duration::from_secs(30),
            proxy: None,
            api_key: None,
            user_directory: Arc::new(NoDirectory),
            container_caches: ContainerCaches::new(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("retry", &self.retry)
            .field("fault_tolerant", &self.fault_tolerant)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .field("api_key", &self.api_key.as_ref().map(|_| "*****"))
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Let read-style calls answer with defaults while the endpoint is
    /// unreachable
    pub fn fault_tolerant(mut self, fault_tolerant: bool) -> Self {
        self.fault_tolerant = fault_tolerant;
        self
    }

    /// Set the per-request timeout (default: 30s)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Route every request through `proxy`
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Sets the credential sent with every request. Blank keys are ignored.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Resolve user-typed fields through `directory`
    pub fn user_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.user_directory = directory;
        self
    }

    /// Shares container-name lookups with every other client built from
    /// the same service.
    pub fn container_caches(mut self, caches: ContainerCaches) -> Self {
        self.container_caches = caches;
        self
    }
}
