//! Domain types served by `graphrpc serve`.

use graphrpc_common::graph::{DomainType, TypeDescriptor, TypeRegistry, ValueKind};
use graphrpc_server::{GenericOperations, Store};

pub struct Note;

impl DomainType for Note {
    const TYPE_TAG: &'static str = "Note";

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_TAG, "notes")
            .element("Title", ValueKind::Text)
            .element("Body", ValueKind::Text)
            .element("Created", ValueKind::DateTime)
            .element("Author", ValueKind::User)
            .elements("Labels", ValueKind::Text)
            .references("Related")
    }
}

pub struct Notebook;

impl DomainType for Notebook {
    const TYPE_TAG: &'static str = "Notebook";

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_TAG, "notebooks")
            .element("Name", ValueKind::Text)
            .references("Notes")
    }
}

pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_type::<Note>().register_type::<Notebook>();
    registry
}

pub fn operations<S: Store>() -> GenericOperations<S> {
    GenericOperations::new().register::<Note>().register::<Notebook>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrpc_server::MemoryStore;

    #[test]
    fn test_every_type_has_operations() {
        let registry = registry();
        let operations = operations::<MemoryStore>();
        assert_eq!(operations.len(), registry.iter().count());
        for descriptor in registry.iter() {
            assert!(operations.get(descriptor.type_tag()).is_some());
        }
        assert_eq!(registry.container_of("Note"), Some("notes"));
    }
}
