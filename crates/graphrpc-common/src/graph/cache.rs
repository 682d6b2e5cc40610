use super::object::{ObjectRef, PersistentObject};
use std::collections::HashMap;
use uuid::Uuid;

/// Arena of nodes keyed by id.
///
/// A decode pass registers every domain node it meets here, which is what
/// makes two references to the same id collapse to one instance. The cache
/// can be scoped to a single decode or kept across calls (the RPC client
/// does the latter).
#[derive(Debug, Clone, Default)]
pub struct ObjectCache {
    nodes: HashMap<Uuid, PersistentObject>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The node with `id`, in whatever state it is.
    pub fn get(&self, id: Uuid) -> Option<&PersistentObject> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut PersistentObject> {
        self.nodes.get_mut(&id)
    }

    /// The node `target` points to.
    pub fn resolve(&self, target: &ObjectRef) -> Option<&PersistentObject> {
        self.get(target.id)
    }

    /// Inserts (or replaces) a node, returning a reference to it.
    pub fn insert(&mut self, object: PersistentObject) -> ObjectRef {
        let target = object.to_ref();
        self.nodes.insert(target.id, object);
        target
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersistentObject> {
        self.nodes.values()
    }
}

impl FromIterator<PersistentObject> for ObjectCache {
    fn from_iter<I: IntoIterator<Item = PersistentObject>>(iter: I) -> Self {
        let mut cache = ObjectCache::new();
        for object in iter {
            cache.insert(object);
        }
        cache
    }
}
