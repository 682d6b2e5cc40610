//! Persistent object graph nodes.
//!
//! A node never owns the nodes it points to. References are
//! [`ObjectRef`] values (id plus type tag) that resolve through an
//! [`ObjectCache`](super::ObjectCache), so shared and cyclic graphs need no
//! aliasing: two references to the same id always denote one node.

use super::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// How much of a node's state is known locally.
///
/// Within one decode a node only moves forward: `Stub -> Partial -> Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RetrievalState {
    /// Only the id (and type tag) is known.
    Stub,
    /// Some fields are populated, e.g. by application writes or a prior call.
    Partial,
    /// All fields were freshly populated.
    Complete,
}

/// A typed pointer to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectRef {
    pub id: Uuid,
    pub type_tag: String,
}

impl ObjectRef {
    pub fn new(id: Uuid, type_tag: impl Into<String>) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
        }
    }
}

/// A collection of object references plus the shadow list of the references
/// it held when it was decoded.
///
/// The shadow list is never touched by application mutation. Stores diff the
/// two lists to find children that became orphaned and must be cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceCollection {
    items: Vec<ObjectRef>,
    initial: Vec<ObjectRef>,
}

impl ReferenceCollection {
    /// A collection built by application code; nothing was referenced before.
    pub fn new(items: Vec<ObjectRef>) -> Self {
        Self {
            items,
            initial: Vec::new(),
        }
    }

    /// A collection as it arrived off the wire: the shadow list starts equal
    /// to the live list.
    pub fn decoded(items: Vec<ObjectRef>) -> Self {
        Self {
            initial: items.clone(),
            items,
        }
    }

    pub fn items(&self) -> &[ObjectRef] {
        &self.items
    }

    pub fn initial(&self) -> &[ObjectRef] {
        &self.initial
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: ObjectRef) {
        self.items.push(item);
    }

    /// Removes every live reference to `id`, returning whether any was removed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|r| r.id != id);
        before != self.items.len()
    }

    /// Replaces the live list, keeping the shadow list.
    pub fn replace(&mut self, items: Vec<ObjectRef>) {
        self.items = items;
    }

    /// References present at decode time that are no longer referenced.
    pub fn orphaned(&self) -> Vec<&ObjectRef> {
        self.initial
            .iter()
            .filter(|old| !self.items.iter().any(|live| live.id == old.id))
            .collect()
    }

    fn reset(&mut self) {
        self.items.clear();
        self.initial.clear();
    }
}

/// One named field of a node, in one of the four field groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Field {
    Element(Value),
    Reference(Option<ObjectRef>),
    Elements(Vec<Value>),
    References(ReferenceCollection),
}

impl Field {
    /// Every object this field points to.
    pub fn referenced(&self) -> Vec<&ObjectRef> {
        match self {
            Field::Reference(Some(r)) => vec![r],
            Field::References(rc) => rc.items().iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// A persistent domain object as seen by the codec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistentObject {
    id: Uuid,
    type_tag: String,
    is_removed: bool,
    state: RetrievalState,
    attached: bool,
    fields: BTreeMap<String, Field>,
}

impl PersistentObject {
    /// Creates a brand-new object with a fresh id. Its state is complete:
    /// everything there is to know about it is local.
    pub fn new(type_tag: impl Into<String>) -> Self {
        let mut object = Self::stub(Uuid::new_v4(), type_tag);
        object.state = RetrievalState::Complete;
        object
    }

    /// Creates a node that only knows its id and type.
    pub fn stub(id: Uuid, type_tag: impl Into<String>) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
            is_removed: false,
            state: RetrievalState::Stub,
            attached: false,
            fields: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn to_ref(&self) -> ObjectRef {
        ObjectRef::new(self.id, self.type_tag.clone())
    }

    /// How much of the node is known. Setters move a stub to `Partial`;
    /// a decode or [`new`](Self::new) makes it `Complete`.
    pub fn state(&self) -> RetrievalState {
        self.state
    }

    pub fn is_removed(&self) -> bool {
        self.is_removed
    }

    /// Sets the tombstone flag.
    pub fn set_removed(&mut self, removed: bool) {
        self.is_removed = removed;
    }

    /// Whether this node is associated with an existing store container.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Fields in wire order (by name).
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Value of a single-value field, if the node has one by that name.
    pub fn element(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            Some(Field::Element(v)) => Some(v),
            _ => None,
        }
    }

    pub fn reference(&self, name: &str) -> Option<&ObjectRef> {
        match self.fields.get(name) {
            Some(Field::Reference(r)) => r.as_ref(),
            _ => None,
        }
    }

    /// Values of a collection field; empty when missing.
    pub fn elements(&self, name: &str) -> &[Value] {
        match self.fields.get(name) {
            Some(Field::Elements(v)) => v,
            _ => &[],
        }
    }

    pub fn references(&self, name: &str) -> Option<&ReferenceCollection> {
        match self.fields.get(name) {
            Some(Field::References(rc)) => Some(rc),
            _ => None,
        }
    }

    /// Every object referenced from any field.
    pub fn referenced(&self) -> Vec<&ObjectRef> {
        self.fields.values().flat_map(Field::referenced).collect()
    }

    /// Sets a single-value field.
    ///
    /// # Example
    ///
    /// ```
    /// use graphrpc_common::graph::{PersistentObject, RetrievalState, Value};
    /// use uuid::Uuid;
    ///
    /// let mut invoice = PersistentObject::stub(Uuid::new_v4(), "Invoice");
    /// invoice.set_element("Title", "A");
    /// assert_eq!(invoice.element("Title"), Some(&Value::from("A")));
    /// assert_eq!(invoice.state(), RetrievalState::Partial);
    /// ```
    pub fn set_element(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.touch();
        self.fields.insert(name.into(), Field::Element(value.into()));
    }

    pub fn set_reference(&mut self, name: impl Into<String>, target: Option<ObjectRef>) {
        self.touch();
        self.fields.insert(name.into(), Field::Reference(target));
    }

    pub fn set_elements(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.touch();
        self.fields.insert(name.into(), Field::Elements(values));
    }

    /// Replaces the live references of a collection field. The shadow list of
    /// an existing collection is kept so orphans stay detectable.
    pub fn set_references(&mut self, name: impl Into<String>, items: Vec<ObjectRef>) {
        self.touch();
        match self.fields.entry(name.into()).or_insert_with(|| {
            Field::References(ReferenceCollection::default())
        }) {
            Field::References(rc) => rc.replace(items),
            other => *other = Field::References(ReferenceCollection::new(items)),
        }
    }

    /// Appends to a reference collection, creating it when missing.
    pub fn push_reference(&mut self, name: &str, item: ObjectRef) {
        self.touch();
        match self.fields.get_mut(name) {
            Some(Field::References(rc)) => rc.push(item),
            _ => {
                self.fields.insert(
                    name.to_string(),
                    Field::References(ReferenceCollection::new(vec![item])),
                );
            }
        }
    }

    /// Drops `id` from a reference collection, returning whether it was there.
    pub fn remove_reference(&mut self, name: &str, id: Uuid) -> bool {
        match self.fields.get_mut(name) {
            Some(Field::References(rc)) => rc.remove(id),
            _ => false,
        }
    }

    /// Drops every reference to `id` across all reference fields.
    pub fn forget(&mut self, id: Uuid) {
        for field in self.fields.values_mut() {
            match field {
                Field::Reference(target) if target.as_ref().is_some_and(|r| r.id == id) => {
                    *target = None;
                }
                Field::References(rc) => {
                    rc.remove(id);
                }
                _ => {}
            }
        }
    }

    /// References that were present when the object was decoded but have been
    /// dropped since, across all reference collections.
    pub fn orphaned_references(&self) -> Vec<&ObjectRef> {
        self.fields
            .values()
            .filter_map(|f| match f {
                Field::References(rc) => Some(rc.orphaned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Marks the node complete and empties its collections, ready for a fresh
    /// payload to replace them.
    pub(crate) fn begin_refresh(&mut self) {
        self.state = RetrievalState::Complete;
        for field in self.fields.values_mut() {
            match field {
                Field::Elements(values) => values.clear(),
                Field::References(rc) => rc.reset(),
                _ => {}
            }
        }
    }

    pub(crate) fn assign(&mut self, name: String, field: Field) {
        self.fields.insert(name, field);
    }

    /// Snapshot used by stores: complete, attached, shadow lists reset to the
    /// current live lists.
    pub fn settled(&self) -> Self {
        let mut copy = self.clone();
        copy.state = RetrievalState::Complete;
        copy.attached = true;
        for field in copy.fields.values_mut() {
            if let Field::References(rc) = field {
                *rc = ReferenceCollection::decoded(rc.items.clone());
            }
        }
        copy
    }

    fn touch(&mut self) {
        if self.state == RetrievalState::Stub {
            self.state = RetrievalState::Partial;
        }
    }
}
