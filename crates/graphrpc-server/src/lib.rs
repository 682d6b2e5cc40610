//! GraphRPC Server
//!
//! Serves a [`Store`] over HTTP. Requests are decoded against the store's
//! own index, dispatched by [`RpcRouter`] and answered with graphs expanded
//! to the depth of the called method.

pub mod directory;
pub mod generic;
pub mod http_server;
pub mod memory_store;
pub mod router;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use directory::MemoryDirectory;
pub use generic::{GenericOperations, TypedOperations};
pub use http_server::HttpServer;
pub use memory_store::MemoryStore;
pub use router::{Action, RpcRouter};
pub use store::{Store, StoreError, StoreResult};
