//! In-memory model of the persistent object graph.
//!
//! - [`PersistentObject`]: one node, its four field groups and its retrieval state
//! - [`ObjectCache`]: the arena of nodes keyed by id
//! - [`TypeRegistry`]: type tag to descriptor (object factory) resolution
//! - [`Value`]: element values, including [`Ticks`] and [`UserRef`]

pub mod cache;
pub mod object;
pub mod registry;
pub mod value;

pub use cache::ObjectCache;
pub use object::{Field, ObjectRef, PersistentObject, ReferenceCollection, RetrievalState};
pub use registry::{DomainType, FieldKind, TypeDescriptor, TypeRegistry};
pub use value::{Ticks, UserRef, Value, ValueKind};
