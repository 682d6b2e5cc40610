//! GraphRPC common types
//!
//! Shared by the client, the server and the CLI:
//!
//! - [`graph`]: persistent objects, the object cache and the type registry
//! - [`codec`]: the object-graph wire codec
//! - [`protocol`]: messages, parameter and result variants, errors
//! - [`directory`]: the user lookup contract
//! - [`auth`] and [`transport`]: API-key checks and HTTP helpers
//!
//! # Example
//!
//! ```
//! use graphrpc_common::codec::{GraphDecoder, GraphEncoder};
//! use graphrpc_common::graph::{ObjectCache, PersistentObject, TypeDescriptor, TypeRegistry, ValueKind};
//!
//! let registry = TypeRegistry::new()
//!     .with(TypeDescriptor::new("Invoice", "invoices").element("Title", ValueKind::Text));
//!
//! let mut invoice = PersistentObject::new("Invoice");
//! invoice.set_element("Title", "A [draft]");
//! let id = invoice.id();
//! let cache: ObjectCache = std::iter::once(invoice).collect();
//!
//! let text = GraphEncoder::new(&cache).encode_object(id, 1).unwrap();
//! assert!(text.contains(r#""Title":"A \[draft\]""#));
//!
//! let mut decoded = ObjectCache::new();
//! let root = GraphDecoder::new(&registry, &mut decoded).decode_object(&text).unwrap();
//! assert_eq!(root.map(|r| r.id), Some(id));
//! ```

pub mod auth;
pub mod codec;
pub mod directory;
pub mod graph;
pub mod protocol;
pub mod transport;

pub use codec::CodecError;
pub use protocol::{GraphRpcError, Message, Parameters, Request, Response, Result, RpcResult};
