//! The object-graph wire codec.
//!
//! The wire text looks like JSON but is not: structural characters inside
//! strings carry a backslash, numbers are culture-invariant and dates are
//! tick counts. [`GraphEncoder`] writes nodes and messages, [`GraphDecoder`]
//! reads them back into an [`ObjectCache`](crate::graph::ObjectCache).

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod escape;
pub mod record;
pub mod splitter;

pub use decoder::{DecodeSide, GraphDecoder, StoreIndex};
pub use encoder::GraphEncoder;
pub use error::CodecError;
pub use escape::{escape, unescape};
pub use record::{Item, Record};
