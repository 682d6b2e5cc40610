//! HTTP plumbing shared by the client and the server.
//!
//! Every call is one POST whose body is the encoded message, sent and
//! answered as `application/json` regardless of the exact payload shape.

pub mod http;

pub use http::{HttpTransport, HyperRequest, HyperResponse, CONTENT_TYPE_JSON};
