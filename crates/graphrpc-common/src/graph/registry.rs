//! Type tag resolution.
//!
//! The codec never reflects over Rust types. Every domain type is described
//! up front by a [`TypeDescriptor`] registered in a [`TypeRegistry`]; the
//! decoder resolves the wire type tag through it to instantiate nodes and to
//! learn how each field's content should be read.

use super::object::PersistentObject;
use super::value::ValueKind;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Shape of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Element(ValueKind),
    Reference,
    Elements(ValueKind),
    References,
}

/// Static description of a domain type: its wire tag, the store container
/// holding its instances, and its declared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    type_tag: String,
    container: String,
    fields: BTreeMap<String, FieldKind>,
}

impl TypeDescriptor {
    /// Describes a type with no declared fields yet.
    ///
    /// # Arguments
    ///
    /// * `type_tag` - Tag written in the `Type` property of every instance
    /// * `container` - Store container holding the instances
    pub fn new(type_tag: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            container: container.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Declares a single-value field.
    pub fn element(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(name.into(), FieldKind::Element(kind));
        self
    }

    /// Declares a field pointing at one other object.
    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldKind::Reference);
        self
    }

    /// Declares a collection of values.
    pub fn elements(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(name.into(), FieldKind::Elements(kind));
        self
    }

    /// Declares a collection of references, tracked for orphans.
    pub fn references(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldKind::References);
        self
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Shape of a declared field. Undeclared fields are inferred from the
    /// wire text when decoding.
    pub fn field(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }

    /// The object factory: a fresh stub of this type.
    pub fn instantiate(&self, id: Uuid) -> PersistentObject {
        PersistentObject::stub(id, self.type_tag.clone())
    }
}

/// A Rust type standing for one domain type.
///
/// Stores expose operations generic over `T: DomainType`; the server turns a
/// type tag arriving in a request into a call to the right instantiation
/// through a registry built at startup.
pub trait DomainType: Send + Sync + 'static {
    const TYPE_TAG: &'static str;

    fn descriptor() -> TypeDescriptor;
}

/// Registry of every domain type known to one side of the wire.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the descriptor for its tag.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types
            .insert(descriptor.type_tag().to_string(), descriptor);
        self
    }

    pub fn register_type<T: DomainType>(&mut self) -> &mut Self {
        self.register(T::descriptor())
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn get(&self, type_tag: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.types.contains_key(type_tag)
    }

    /// Container registered for `type_tag`.
    pub fn container_of(&self, type_tag: &str) -> Option<&str> {
        self.get(type_tag).map(TypeDescriptor::container)
    }

    /// Tag of the type registered with `container`.
    pub fn type_of_container(&self, container: &str) -> Option<&str> {
        self.types
            .values()
            .find(|d| d.container() == container)
            .map(TypeDescriptor::type_tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RetrievalState;

    struct Invoice;

    impl DomainType for Invoice {
        const TYPE_TAG: &'static str = "Invoice";

        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::new(Self::TYPE_TAG, "invoices")
                .element("Title", ValueKind::Text)
                .references("Lines")
        }
    }

    #[test]
    fn test_register_domain_type() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Invoice>();

        let descriptor = registry.get("Invoice").unwrap();
        assert_eq!(descriptor.container(), "invoices");
        assert_eq!(descriptor.field("Title"), Some(FieldKind::Element(ValueKind::Text)));
        assert_eq!(descriptor.field("Lines"), Some(FieldKind::References));
        assert_eq!(descriptor.field("Missing"), None);
    }

    #[test]
    fn test_container_lookup_both_ways() {
        let registry = TypeRegistry::new().with(Invoice::descriptor());
        assert_eq!(registry.container_of("Invoice"), Some("invoices"));
        assert_eq!(registry.type_of_container("invoices"), Some("Invoice"));
        assert_eq!(registry.type_of_container("nope"), None);
    }

    #[test]
    fn test_instantiate_creates_stub() {
        let id = Uuid::new_v4();
        let node = Invoice::descriptor().instantiate(id);
        assert_eq!(node.id(), id);
        assert_eq!(node.state(), RetrievalState::Stub);
    }
}
