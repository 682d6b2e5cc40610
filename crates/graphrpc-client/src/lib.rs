//! GraphRPC client
//!
//! [`GraphRpcClient`] talks to a GraphRPC endpoint over HTTP. Calls are
//! retried on transport failure with linear backoff; once retries run out
//! the client considers the endpoint offline until a ping succeeds.

pub mod client;
pub mod config;
pub mod container_cache;
pub mod exchange;
pub mod online;

pub use client::{GraphRpcClient, Objects};
pub use config::{ClientConfig, RetryConfig};
pub use container_cache::{ContainerCaches, ContainerNameCache};
pub use exchange::{Exchange, HttpExchange};
pub use online::OnlineState;
