//! Reference in-memory [`Store`].

use crate::store::{Store, StoreError, StoreResult};
use graphrpc_common::codec::StoreIndex;
use graphrpc_common::graph::{
    DomainType, Field, ObjectCache, ObjectRef, PersistentObject, RetrievalState, TypeRegistry, Value,
};
use graphrpc_common::protocol::{order_by, Filter, Paging, SortCriterion};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

/// Thread-safe store keeping every object in memory.
///
/// Containers come from the type registry: an object lives in the container
/// its type is registered with. Removed ids are remembered per container
/// until [`Store::cleanup`].
pub struct MemoryStore {
    registry: Arc<TypeRegistry>,
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    objects: HashMap<Uuid, PersistentObject>,
    tombstones: HashMap<String, HashSet<Uuid>>,
}

impl MemoryStore {
    /// Create an empty store whose containers are those of `registry`
    pub fn new(registry: impl Into<Arc<TypeRegistry>>) -> Self {
        Self {
            registry: registry.into(),
            state: RwLock::new(State::default()),
        }
    }

    /// Number of live objects across all containers
    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().objects.is_empty()
    }

    /// Stores a single object as is, replacing any previous version.
    pub fn insert(&self, object: PersistentObject) -> StoreResult<ObjectRef> {
        self.container_of(object.type_tag())?;
        let settled = object.settled();
        let target = settled.to_ref();
        self.write().objects.insert(target.id, settled);
        Ok(target)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn container_of(&self, type_tag: &str) -> StoreResult<&str> {
        self.registry
            .container_of(type_tag)
            .ok_or_else(|| StoreError::UnknownType(type_tag.to_string()))
    }

    fn check_container(&self, container: &str) -> StoreResult<()> {
        match self.registry.type_of_container(container) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownContainer(container.to_string())),
        }
    }

    fn in_container(&self, object: &PersistentObject, container: &str) -> bool {
        self.registry.container_of(object.type_tag()) == Some(container)
    }

    /// Nodes with known state reachable from `target` through other nodes
    /// with known state. Stubs are references only and are not written.
    fn reachable(&self, objects: &ObjectCache, target: &ObjectRef) -> StoreResult<Vec<PersistentObject>> {
        let root = objects
            .resolve(target)
            .filter(|node| node.state() != RetrievalState::Stub)
            .ok_or_else(|| StoreError::InvalidObject(format!("{} arrived without its state", target.id)))?;

        let mut seen = HashSet::new();
        let mut stack = vec![root];
        let mut nodes = Vec::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.id()) || node.is_removed() {
                continue;
            }
            self.container_of(node.type_tag())?;
            nodes.push(node.settled());
            for r in node.referenced() {
                if let Some(child) = objects.get(r.id) {
                    if child.state() != RetrievalState::Stub {
                        stack.push(child);
                    }
                }
            }
        }
        Ok(nodes)
    }

    fn remove_locked(&self, state: &mut State, id: Uuid) {
        if let Some(removed) = state.objects.remove(&id) {
            if let Some(container) = self.registry.container_of(removed.type_tag()) {
                state
                    .tombstones
                    .entry(container.to_string())
                    .or_default()
                    .insert(id);
            }
            for other in state.objects.values_mut() {
                other.forget(id);
            }
            debug!("Removed {} {}", removed.type_tag(), id);
        }
    }

    fn matching<T: DomainType>(
        &self,
        state: &State,
        container: &str,
        filter: &Filter,
    ) -> StoreResult<Vec<PersistentObject>> {
        self.check_container(container)?;
        let mut found: Vec<PersistentObject> = state
            .objects
            .values()
            .filter(|o| o.type_tag() == T::TYPE_TAG && self.in_container(o, container))
            .filter(|o| filter.matches(&|name: &str| field_value(o, name)))
            .cloned()
            .collect();
        found.sort_by_key(PersistentObject::id);
        Ok(found)
    }
}

/// Value of a named field as filters and sorting see it. References compare
/// by the id they point to.
fn field_value(object: &PersistentObject, name: &str) -> Option<Value> {
    if name == "Id" {
        return Some(Value::Guid(object.id()));
    }
    match object.field(name)? {
        Field::Element(value) => Some(value.clone()),
        Field::Reference(target) => Some(target.as_ref().map_or(Value::Null, |r| Value::Guid(r.id))),
        Field::Elements(_) | Field::References(_) => None,
    }
}

fn numbers<'a>(objects: &'a [PersistentObject], field: &'a str) -> impl Iterator<Item = f64> + 'a {
    objects
        .iter()
        .filter_map(move |o| field_value(o, field).and_then(|v| v.as_f64()))
}

impl StoreIndex for MemoryStore {
    fn contains_id(&self, id: Uuid) -> bool {
        self.read().objects.contains_key(&id)
    }
}

impl Store for MemoryStore {
    fn add(&self, objects: &ObjectCache, target: &ObjectRef) -> StoreResult<()> {
        let nodes = self.reachable(objects, target)?;
        let mut state = self.write();
        if state.objects.contains_key(&target.id) {
            return Err(StoreError::AlreadyExists(target.id));
        }
        for node in nodes {
            if node.id() == target.id || !state.objects.contains_key(&node.id()) {
                state.objects.insert(node.id(), node);
            }
        }
        Ok(())
    }

    fn update(&self, objects: &ObjectCache, target: &ObjectRef) -> StoreResult<()> {
        let nodes = self.reachable(objects, target)?;
        let mut state = self.write();
        let stored = state
            .objects
            .get(&target.id)
            .ok_or(StoreError::NotFound(target.id))?;

        // The stored version's collections act as the shadow lists; whatever
        // the new version no longer holds is orphaned.
        let mut diff = stored.clone();
        if let Some(incoming) = nodes.iter().find(|n| n.id() == target.id) {
            for (name, field) in incoming.fields() {
                if let Field::References(rc) = field {
                    diff.set_references(name, rc.items().to_vec());
                }
            }
        }
        let orphans: Vec<Uuid> = diff.orphaned_references().iter().map(|r| r.id).collect();

        for node in nodes {
            state.objects.insert(node.id(), node);
        }
        for orphan in orphans {
            let referenced = state
                .objects
                .values()
                .any(|o| o.referenced().iter().any(|r| r.id == orphan));
            if !referenced {
                self.remove_locked(&mut state, orphan);
            }
        }
        Ok(())
    }

    fn remove(&self, object: &PersistentObject) -> StoreResult<()> {
        let mut state = self.write();
        if !state.objects.contains_key(&object.id()) {
            return Err(StoreError::NotFound(object.id()));
        }
        self.remove_locked(&mut state, object.id());
        Ok(())
    }

    fn remove_cascaded(&self, object: &PersistentObject, only_if_unreferenced: bool) -> StoreResult<()> {
        let mut state = self.write();
        let root = object.id();
        if !state.objects.contains_key(&root) {
            return Err(StoreError::NotFound(root));
        }

        let mut doomed = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = state.objects.get(&id) {
                if doomed.insert(id) {
                    stack.extend(node.referenced().iter().map(|r| r.id));
                }
            }
        }

        if only_if_unreferenced {
            // Spare anything still referenced from outside the doomed set,
            // until no more nodes are spared.
            loop {
                let spared: Vec<Uuid> = doomed
                    .iter()
                    .copied()
                    .filter(|&id| id != root)
                    .filter(|&id| {
                        state.objects.values().any(|o| {
                            !doomed.contains(&o.id()) && o.referenced().iter().any(|r| r.id == id)
                        })
                    })
                    .collect();
                if spared.is_empty() {
                    break;
                }
                for id in spared {
                    doomed.remove(&id);
                }
            }
        }

        for id in doomed {
            self.remove_locked(&mut state, id);
        }
        Ok(())
    }

    fn contains(&self, container: &str, id: Uuid) -> StoreResult<bool> {
        self.check_container(container)?;
        Ok(self
            .read()
            .objects
            .get(&id)
            .is_some_and(|o| self.in_container(o, container)))
    }

    fn is_id_deleted(&self, container: &str, id: Uuid) -> StoreResult<bool> {
        self.check_container(container)?;
        Ok(self
            .read()
            .tombstones
            .get(container)
            .is_some_and(|ids| ids.contains(&id)))
    }

    fn retrieve(&self, container: &str, id: Uuid) -> StoreResult<Option<PersistentObject>> {
        self.check_container(container)?;
        Ok(self
            .read()
            .objects
            .get(&id)
            .filter(|o| self.in_container(o, container))
            .cloned())
    }

    fn load(&self, id: Uuid) -> Option<PersistentObject> {
        self.read().objects.get(&id).cloned()
    }

    fn count<T: DomainType>(&self, container: &str, filter: &Filter) -> StoreResult<i64> {
        let state = self.read();
        Ok(self.matching::<T>(&state, container, filter)?.len() as i64)
    }

    fn find<T: DomainType>(
        &self,
        container: &str,
        filter: &Filter,
        sort: &[SortCriterion],
        paging: Paging,
    ) -> StoreResult<Vec<PersistentObject>> {
        let state = self.read();
        let mut found = self.matching::<T>(&state, container, filter)?;
        found.sort_by(|a, b| {
            order_by(sort, &|n: &str| field_value(a, n), &|n: &str| field_value(b, n))
        });
        Ok(paging.apply(found))
    }

    fn find_distinct_values<T: DomainType>(
        &self,
        container: &str,
        field_name: &str,
        filter: &Filter,
    ) -> StoreResult<Vec<Value>> {
        let state = self.read();
        let mut distinct: Vec<Value> = Vec::new();
        for object in self.matching::<T>(&state, container, filter)? {
            let value = field_value(&object, field_name).unwrap_or(Value::Null);
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        Ok(distinct)
    }

    fn find_sums_of_values<T: DomainType>(
        &self,
        container: &str,
        field_names: &[String],
        filter: &Filter,
    ) -> StoreResult<Vec<f64>> {
        let state = self.read();
        let found = self.matching::<T>(&state, container, filter)?;
        Ok(field_names
            .iter()
            .map(|field| numbers(&found, field).sum::<f64>())
            .collect())
    }

    fn find_average_values<T: DomainType>(
        &self,
        container: &str,
        field_names: &[String],
        filter: &Filter,
    ) -> StoreResult<Vec<f64>> {
        let state = self.read();
        let found = self.matching::<T>(&state, container, filter)?;
        Ok(field_names
            .iter()
            .map(|field| {
                let (sum, count) = numbers(&found, field).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect())
    }

    fn container_name_of_type(&self, type_tag: &str) -> Option<String> {
        self.registry.container_of(type_tag).map(str::to_string)
    }

    fn type_of_container(&self, container: &str) -> Option<String> {
        self.registry.type_of_container(container).map(str::to_string)
    }

    fn cleanup(&self) -> StoreResult<()> {
        let mut state = self.write();
        let purged: usize = state.tombstones.values().map(HashSet::len).sum();
        state.tombstones.clear();
        debug!("Cleanup purged {} tombstones", purged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{invoice, invoice_with_lines, line, registry, Invoice, Line};
    use graphrpc_common::protocol::CompareOp;

    fn graph(nodes: Vec<PersistentObject>) -> ObjectCache {
        nodes.into_iter().collect()
    }

    #[test]
    fn test_add_stores_reachable_graph() {
        let store = MemoryStore::new(registry());
        let (root, lines) = invoice_with_lines("A", vec![line(1, 2.0), line(3, 4.0)]);
        let target = root.to_ref();
        let mut nodes = vec![root];
        nodes.extend(lines);

        store.add(&graph(nodes), &target).unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.contains("invoices", target.id).unwrap());
        assert!(!store.contains("lines", target.id).unwrap());
        assert!(store.contains_id(target.id));

        let again = graph(vec![store.load(target.id).unwrap()]);
        assert_eq!(
            store.add(&again, &target),
            Err(StoreError::AlreadyExists(target.id))
        );
    }

    #[test]
    fn test_add_rejects_stub_root() {
        let store = MemoryStore::new(registry());
        let stub = PersistentObject::stub(Uuid::new_v4(), "Invoice");
        let target = stub.to_ref();
        assert!(matches!(
            store.add(&graph(vec![stub]), &target),
            Err(StoreError::InvalidObject(_))
        ));
    }

    #[test]
    fn test_update_removes_orphaned_children() {
        let store = MemoryStore::new(registry());
        let (root, lines) = invoice_with_lines("A", vec![line(1, 2.0), line(3, 4.0)]);
        let target = root.to_ref();
        let kept = lines[0].to_ref();
        let dropped = lines[1].id();
        let mut nodes = vec![root];
        nodes.extend(lines);
        store.add(&graph(nodes), &target).unwrap();

        let mut edited = store.load(target.id).unwrap();
        edited.set_references("Lines", vec![kept.clone()]);
        edited.set_element("Title", "B");
        store.update(&graph(vec![edited]), &target).unwrap();

        assert!(store.load(dropped).is_none());
        assert!(store.is_id_deleted("lines", dropped).unwrap());
        assert!(store.load(kept.id).is_some());
        assert_eq!(
            store.load(target.id).unwrap().element("Title"),
            Some(&Value::from("B"))
        );
    }

    #[test]
    fn test_update_unknown_object() {
        let store = MemoryStore::new(registry());
        let object = invoice("A", 1.0);
        let target = object.to_ref();
        assert_eq!(
            store.update(&graph(vec![object]), &target),
            Err(StoreError::NotFound(target.id))
        );
    }

    #[test]
    fn test_remove_and_cleanup() {
        let store = MemoryStore::new(registry());
        let target = store.insert(invoice("A", 1.0)).unwrap();
        let object = store.load(target.id).unwrap();

        store.remove(&object).unwrap();
        assert!(!store.contains("invoices", target.id).unwrap());
        assert!(store.is_id_deleted("invoices", target.id).unwrap());
        assert_eq!(store.remove(&object), Err(StoreError::NotFound(target.id)));

        store.cleanup().unwrap();
        assert!(!store.is_id_deleted("invoices", target.id).unwrap());
    }

    #[test]
    fn test_remove_cascaded_spares_shared_children() {
        let store = MemoryStore::new(registry());
        let shared = store.insert(line(1, 1.0)).unwrap();
        let owned = store.insert(line(2, 2.0)).unwrap();

        let mut first = invoice("first", 0.0);
        first.set_references("Lines", vec![shared.clone(), owned.clone()]);
        let first = store.insert(first).unwrap();
        let mut second = invoice("second", 0.0);
        second.set_references("Lines", vec![shared.clone()]);
        store.insert(second).unwrap();

        let node = store.load(first.id).unwrap();
        store.remove_cascaded(&node, true).unwrap();
        assert!(store.load(first.id).is_none());
        assert!(store.load(owned.id).is_none());
        assert!(store.load(shared.id).is_some());
    }

    #[test]
    fn test_remove_cascaded_unconditionally() {
        let store = MemoryStore::new(registry());
        let shared = store.insert(line(1, 1.0)).unwrap();
        let mut first = invoice("first", 0.0);
        first.set_references("Lines", vec![shared.clone()]);
        let first = store.insert(first).unwrap();
        let mut second = invoice("second", 0.0);
        second.set_references("Lines", vec![shared.clone()]);
        let second = store.insert(second).unwrap();

        let node = store.load(first.id).unwrap();
        store.remove_cascaded(&node, false).unwrap();
        assert!(store.load(shared.id).is_none());
        // References to removed objects are dropped.
        assert!(store.load(second.id).unwrap().references("Lines").unwrap().is_empty());
    }

    #[test]
    fn test_queries() {
        let store = MemoryStore::new(registry());
        store.insert(invoice("alpha", 10.0)).unwrap();
        store.insert(invoice("beta", 20.0)).unwrap();
        store.insert(invoice("gamma", 30.0)).unwrap();
        store.insert(line(1, 1.0)).unwrap();

        let cheap = Filter::compare("Amount", CompareOp::Less, 25.0);
        assert_eq!(store.count::<Invoice>("invoices", &Filter::All).unwrap(), 3);
        assert_eq!(store.count::<Invoice>("invoices", &cheap).unwrap(), 2);
        assert_eq!(store.count::<Line>("lines", &Filter::All).unwrap(), 1);

        let found = store
            .find::<Invoice>(
                "invoices",
                &Filter::All,
                &[SortCriterion::descending("Amount")],
                Paging::new(1, Some(1)),
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].element("Title"), Some(&Value::from("beta")));

        let complement = store
            .find_complement::<Invoice>("invoices", &cheap, &[], Paging::default())
            .unwrap();
        assert_eq!(complement.len(), 1);
        assert_eq!(complement[0].element("Title"), Some(&Value::from("gamma")));

        let sums = store
            .find_sums_of_values::<Invoice>("invoices", &["Amount".into(), "Missing".into()], &Filter::All)
            .unwrap();
        assert_eq!(sums, vec![60.0, 0.0]);
        let averages = store
            .find_average_values::<Invoice>("invoices", &["Amount".into()], &cheap)
            .unwrap();
        assert_eq!(averages, vec![15.0]);
    }

    #[test]
    fn test_distinct_values() {
        let store = MemoryStore::new(registry());
        store.insert(invoice("same", 1.0)).unwrap();
        store.insert(invoice("same", 2.0)).unwrap();
        store.insert(invoice("other", 3.0)).unwrap();

        let mut titles = store
            .find_distinct_values::<Invoice>("invoices", "Title", &Filter::All)
            .unwrap();
        titles.sort_by(|a, b| a.compare(b).unwrap());
        assert_eq!(titles, vec![Value::from("other"), Value::from("same")]);
    }

    #[test]
    fn test_unknown_container() {
        let store = MemoryStore::new(registry());
        assert_eq!(
            store.count::<Invoice>("nope", &Filter::All),
            Err(StoreError::UnknownContainer("nope".into()))
        );
        assert_eq!(store.container_name_of_type("Invoice").as_deref(), Some("invoices"));
        assert_eq!(store.type_of_container("lines").as_deref(), Some("Line"));
        assert!(store.insert(PersistentObject::new("Unknown")).is_err());
    }
}
