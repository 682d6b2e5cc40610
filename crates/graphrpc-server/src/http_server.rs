//! HTTP Server for GraphRPC
//!
//! The server accepts one encoded message per POST body and answers with the
//! encoded response. Decoding, dispatch and store work run on the blocking
//! pool; the connection tasks only move bytes.
//!
//! # Example
//!
//! ```no_run
//! use graphrpc_server::{GenericOperations, HttpServer, MemoryStore, RpcRouter};
//! use graphrpc_common::graph::TypeRegistry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(TypeRegistry::new());
//!     let store = Arc::new(MemoryStore::new(registry.clone()));
//!     let router = RpcRouter::new(store, registry, GenericOperations::new());
//!     let server = HttpServer::new(router);
//!     server.run("127.0.0.1:8080".parse().unwrap()).await.unwrap();
//! }
//! ```

use crate::router::RpcRouter;
use crate::store::Store;
use graphrpc_common::auth::AuthConfig;
use graphrpc_common::protocol::ErrorResponse;
use graphrpc_common::codec::GraphEncoder;
use graphrpc_common::graph::ObjectCache;
use graphrpc_common::transport::{HttpTransport, HyperRequest, HyperResponse};
use graphrpc_common::{GraphRpcError, Message};
use http_body_util::BodyExt;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use uuid::Uuid;

/// HTTP/1.1 server answering POSTed GraphRPC messages
pub struct HttpServer<S: Store> {
    router: Arc<RpcRouter<S>>,
    auth: AuthConfig,
}

impl<S: Store> HttpServer<S> {
    /// Create a server around `router`, with authentication disabled
    ///
    /// # Arguments
    ///
    /// * `router` - The router every request body is handed to
    ///
    /// # Returns
    ///
    /// A new `HttpServer` instance
    pub fn new(router: RpcRouter<S>) -> Self {
        Self {
            router: Arc::new(router),
            auth: AuthConfig::disabled(),
        }
    }

    /// Requires every request to carry the configured API key.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Binds `addr` and serves until the task is dropped.
    ///
    /// # Arguments
    ///
    /// * `addr` - The socket address to bind to
    ///
    /// # Returns
    ///
    /// A `Transport` error if the address cannot be bound or a connection
    /// cannot be accepted; otherwise it never returns
    pub async fn run(self, addr: SocketAddr) -> Result<(), GraphRpcError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GraphRpcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serves connections accepted from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), GraphRpcError> {
        info!(
            "HTTP server listening on {} (auth: {})",
            listener.local_addr()?,
            self.auth
        );

        let auth = Arc::new(self.auth);
        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| GraphRpcError::Transport(format!("Failed to accept connection: {}", e)))?;

            let io = TokioIo::new(stream);
            let router = self.router.clone();
            let auth = auth.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let router = router.clone();
                    let auth = auth.clone();
                    async move { Self::handle_request(router, &auth, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {}", err);
                }
            });
        }
    }

    /// Handle a single HTTP request
    ///
    /// # Arguments
    ///
    /// * `router` - The router to hand the body to
    /// * `auth` - API key check applied before the body is read
    /// * `req` - The incoming HTTP request
    ///
    /// # Returns
    ///
    /// 405 for anything but POST, 401 for a missing or wrong key, and 200
    /// with an encoded message otherwise
    async fn handle_request(
        router: Arc<RpcRouter<S>>,
        auth: &AuthConfig,
        req: HyperRequest,
    ) -> Result<HyperResponse, GraphRpcError> {
        if req.method() != hyper::Method::POST {
            return Ok(HttpTransport::method_not_allowed());
        }
        if !auth.authorize(req.headers()) {
            warn!("Rejected request without a valid API key");
            return Ok(HttpTransport::unauthorized());
        }

        let body = req
            .into_body()
            .collect()
            .await
            .map_err(|e| GraphRpcError::Transport(format!("Failed to read request body: {}", e)))?
            .to_bytes();

        let text = match HttpTransport::body_text(body) {
            Ok(text) => text,
            Err(e) => return Ok(failure(ErrorResponse::parse_error(Uuid::nil(), e))),
        };

        match tokio::task::spawn_blocking(move || router.handle_text(&text)).await {
            Ok(answer) => Ok(HttpTransport::to_http_response(answer)),
            Err(e) => {
                error!("Request handler panicked: {}", e);
                Ok(failure(ErrorResponse::internal_error(Uuid::nil(), e.to_string())))
            }
        }
    }
}

/// An error answered without going through the router.
fn failure(error: ErrorResponse) -> HyperResponse {
    let body = GraphEncoder::new(&ObjectCache::new())
        .encode_message(&Message::from(error), 0)
        .unwrap_or_default();
    HttpTransport::to_http_response_with_status(body, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::registry;
    use crate::generic::GenericOperations;
    use crate::memory_store::MemoryStore;

    fn server() -> HttpServer<MemoryStore> {
        let store = Arc::new(MemoryStore::new(registry()));
        HttpServer::new(RpcRouter::new(store, registry(), GenericOperations::new()))
    }

    #[test]
    fn test_auth_is_disabled_by_default() {
        assert!(!server().auth.requires_auth());
        let secured = server().with_auth(AuthConfig::with_api_key("k"));
        assert!(secured.auth.requires_auth());
    }

    #[test]
    fn test_failure_body_is_an_error_message() {
        let response = failure(ErrorResponse::parse_error(Uuid::nil(), "bad"));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let error = server().run(addr).await.unwrap_err();
        assert!(matches!(error, GraphRpcError::Transport(_)));
    }
}
