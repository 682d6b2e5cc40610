use super::error::{fragment, CodecError};
use super::escape::unescape;
use super::record::{Item, Record};
use super::splitter::{classify, delimited, split_property, split_top_level, Token};
use crate::directory::{NoDirectory, UserDirectory};
use crate::graph::{
    Field, FieldKind, ObjectCache, ObjectRef, ReferenceCollection, Ticks, TypeRegistry, UserRef,
    Value, ValueKind,
};
use crate::protocol::{is_record_tag, Message};
use std::collections::HashSet;
use uuid::Uuid;

static NO_DIRECTORY: NoDirectory = NoDirectory;

/// Answers whether a store already holds an object.
pub trait StoreIndex {
    fn contains_id(&self, id: Uuid) -> bool;
}

/// Which side of the wire is decoding.
#[derive(Clone, Copy)]
pub enum DecodeSide<'a> {
    /// A remote client: every decoded node is associated with its container.
    Remote,
    /// The store's own process: only nodes the store already holds are.
    Local(&'a dyn StoreIndex),
}

enum Decoded {
    Node(ObjectRef),
    Record(Record),
}

/// Reads wire text into an [`ObjectCache`].
///
/// Every domain node met during a decode is registered in the cache, so
/// repeated ids collapse to one node. Transient protocol records are
/// returned by value and never cached.
///
/// A node is merged the first time it arrives with fields in a decoder's
/// pass and left alone afterwards. Nodes completed by an earlier pass over
/// the same cache are refreshed like partial ones.
///
/// # Example
///
/// ```
/// use graphrpc_common::codec::GraphDecoder;
/// use graphrpc_common::graph::{ObjectCache, TypeDescriptor, TypeRegistry, Value, ValueKind};
///
/// let registry = TypeRegistry::new()
///     .with(TypeDescriptor::new("Invoice", "invoices").element("Title", ValueKind::Text));
/// let mut cache = ObjectCache::new();
/// let text = r#"{"Id":"01234567-89ab-cdef-0123-456789abcdef","Type":"Invoice","Title":"A"}"#;
///
/// let root = GraphDecoder::new(&registry, &mut cache)
///     .decode_object(text)
///     .unwrap()
///     .unwrap();
/// assert_eq!(cache.get(root.id).unwrap().element("Title"), Some(&Value::from("A")));
/// ```
pub struct GraphDecoder<'a> {
    registry: &'a TypeRegistry,
    cache: &'a mut ObjectCache,
    side: DecodeSide<'a>,
    force: Option<Uuid>,
    users: &'a dyn UserDirectory,
    completed: HashSet<Uuid>,
}

impl<'a> GraphDecoder<'a> {
    /// Creates a decoder writing into `cache`.
    ///
    /// # Arguments
    ///
    /// * `registry` - Descriptors used to instantiate nodes by type tag
    /// * `cache` - Arena receiving every decoded node; may already hold
    ///   nodes from earlier calls
    ///
    /// The decoder starts on the remote side, with no forced id and no user
    /// directory.
    pub fn new(registry: &'a TypeRegistry, cache: &'a mut ObjectCache) -> Self {
        Self {
            registry,
            cache,
            side: DecodeSide::Remote,
            force: None,
            users: &NO_DIRECTORY,
            completed: HashSet::new(),
        }
    }

    /// Decodes as a remote client: new nodes are always attached.
    pub fn remote(mut self) -> Self {
        self.side = DecodeSide::Remote;
        self
    }

    /// Decodes inside the store's process: new nodes are attached only when
    /// `index` already holds their id.
    pub fn local(mut self, index: &'a dyn StoreIndex) -> Self {
        self.side = DecodeSide::Local(index);
        self
    }

    /// Names the one node that must be merged even if this pass already
    /// completed it. The first occurrence of the id consumes the directive.
    pub fn force(mut self, id: Option<Uuid>) -> Self {
        self.force = id;
        self
    }

    /// Resolves user-valued fields through `users`.
    ///
    /// Without a directory, user ids decode to unresolved references; the
    /// nil id always decodes to the anonymous user.
    pub fn users(mut self, users: &'a dyn UserDirectory) -> Self {
        self.users = users;
        self
    }

    /// The forcing directive, if no node has consumed it yet.
    pub fn pending_force(&self) -> Option<Uuid> {
        self.force
    }

    /// Decodes a single top-level object. `null` and empty text decode to
    /// nothing.
    pub fn decode_object(&mut self, text: &str) -> Result<Option<ObjectRef>, CodecError> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("null") {
            return Ok(None);
        }
        match self.top_level(text)? {
            Decoded::Node(r) => Ok(Some(r)),
            Decoded::Record(r) => Err(CodecError::invalid_record(
                &r.type_tag,
                "expected a persistent object",
            )),
        }
    }

    /// Decodes a top-level transient record such as a message or parameter.
    pub fn decode_record(&mut self, text: &str) -> Result<Record, CodecError> {
        match self.top_level(text)? {
            Decoded::Record(r) => Ok(r),
            Decoded::Node(r) => Err(CodecError::invalid_record(
                &r.type_tag,
                "expected a transient record",
            )),
        }
    }

    /// Decodes a request, response or error message.
    pub fn decode_message(&mut self, text: &str) -> Result<Message, CodecError> {
        let record = self.decode_record(text)?;
        Message::from_record(record)
    }

    fn top_level(&mut self, text: &str) -> Result<Decoded, CodecError> {
        if delimited(text, '{', '}').is_none() {
            return Err(CodecError::NotAnObject(fragment(text)));
        }
        self.object(text.trim())
    }

    fn object(&mut self, token: &str) -> Result<Decoded, CodecError> {
        let inner =
            delimited(token, '{', '}').ok_or_else(|| CodecError::NotAnObject(fragment(token)))?;

        let mut id = None;
        let mut type_tag = None;
        let mut removed = None;
        let mut props = Vec::new();

        for part in split_top_level(inner, ',')? {
            if part.is_empty() {
                return Err(CodecError::MalformedProperty(fragment(inner)));
            }
            let (raw_key, raw_value) = split_property(part)?;
            let key = match classify(raw_key) {
                Ok(Token::Quoted(k)) => unescape(k),
                _ => return Err(CodecError::MalformedKey(fragment(raw_key))),
            };
            match key.as_str() {
                "Id" => id = Some(parse_id(raw_value)?),
                "Type" => type_tag = Some(parse_text(raw_value)?),
                "IsRemoved" => removed = Some(parse_bool(raw_value)?),
                _ => props.push((key, raw_value)),
            }
        }

        let id = id.ok_or_else(|| CodecError::MissingId(fragment(token)))?;
        match type_tag {
            Some(tag) if is_record_tag(&tag) => self.record(id, tag, props),
            tag => self.node(id, tag, removed, props, token),
        }
    }

    fn record(
        &mut self,
        id: Uuid,
        tag: String,
        props: Vec<(String, &str)>,
    ) -> Result<Decoded, CodecError> {
        let mut record = Record::with_id(id, tag);
        for (key, raw) in props {
            let item = self.item(raw)?;
            record.fields.insert(key, item);
        }
        Ok(Decoded::Record(record))
    }

    fn item(&mut self, raw: &str) -> Result<Item, CodecError> {
        Ok(match classify(raw)? {
            Token::Null => Item::Null,
            Token::Bool(b) => Item::Bool(b),
            Token::Quoted(s) => Item::Text(unescape(s)),
            Token::Number(n) => match n.parse::<i64>() {
                Ok(i) => Item::Int(i),
                Err(_) => Item::Decimal(parse_f64(n)?),
            },
            Token::Object(t) => match self.object(t)? {
                Decoded::Node(r) => Item::Node(r),
                Decoded::Record(r) => Item::Record(r),
            },
            Token::Array(inner) => {
                let mut items = Vec::new();
                for part in array_parts(inner, raw)? {
                    items.push(self.item(part)?);
                }
                Item::List(items)
            }
        })
    }

    fn node(
        &mut self,
        id: Uuid,
        type_tag: Option<String>,
        removed: Option<bool>,
        props: Vec<(String, &str)>,
        token: &str,
    ) -> Result<Decoded, CodecError> {
        let registry = self.registry;

        let forced = self.force == Some(id);
        if forced {
            self.force = None;
        }

        if !self.cache.contains(id) {
            let tag = type_tag.ok_or_else(|| CodecError::MissingType(fragment(token)))?;
            let descriptor = registry
                .get(&tag)
                .ok_or_else(|| CodecError::UnknownType(tag.clone()))?;
            let mut node = descriptor.instantiate(id);
            node.set_attached(match self.side {
                DecodeSide::Remote => true,
                DecodeSide::Local(index) => index.contains_id(id),
            });
            self.cache.insert(node);
        }

        let tag = match self.cache.get(id) {
            Some(node) => node.type_tag().to_string(),
            None => return Err(CodecError::UnknownObject(id)),
        };
        let merge = forced || !self.completed.contains(&id);
        let descriptor = registry.get(&tag);

        if merge && (removed.is_some() || !props.is_empty()) {
            if let Some(node) = self.cache.get_mut(id) {
                node.set_removed(removed.unwrap_or(false));
            }
        }

        let mut refreshed = false;
        for (key, raw) in props {
            if merge && !refreshed {
                if let Some(node) = self.cache.get_mut(id) {
                    node.begin_refresh();
                }
                self.completed.insert(id);
                refreshed = true;
            }
            // Nested values are decoded even when not merged so that the
            // nodes they carry still register.
            let kind = descriptor.and_then(|d| d.field(&key));
            let field = self.field(kind, raw)?;
            if merge {
                if let Some(node) = self.cache.get_mut(id) {
                    node.assign(key, field);
                }
            }
        }

        Ok(Decoded::Node(ObjectRef::new(id, tag)))
    }

    fn nested_node(&mut self, token: &str) -> Result<ObjectRef, CodecError> {
        match self.object(token)? {
            Decoded::Node(r) => Ok(r),
            Decoded::Record(r) => Err(CodecError::invalid_record(
                &r.type_tag,
                "transient record inside a persistent object",
            )),
        }
    }

    fn field(&mut self, kind: Option<FieldKind>, raw: &str) -> Result<Field, CodecError> {
        let token = classify(raw)?;
        let malformed = || CodecError::MalformedValue(fragment(raw));

        match kind {
            Some(FieldKind::Element(kind)) => match token {
                Token::Array(_) | Token::Object(_) => Err(malformed()),
                scalar => Ok(Field::Element(self.scalar(scalar, kind, raw)?)),
            },
            Some(FieldKind::Reference) => match token {
                Token::Null => Ok(Field::Reference(None)),
                Token::Object(t) => Ok(Field::Reference(Some(self.nested_node(t)?))),
                _ => Err(malformed()),
            },
            Some(FieldKind::Elements(kind)) => match token {
                Token::Null => Ok(Field::Elements(Vec::new())),
                Token::Array(inner) => Ok(Field::Elements(self.elements(inner, Some(kind), raw)?)),
                _ => Err(malformed()),
            },
            Some(FieldKind::References) => match token {
                Token::Null => Ok(Field::References(ReferenceCollection::default())),
                Token::Array(inner) => {
                    let refs = self.references(inner, raw)?;
                    Ok(Field::References(ReferenceCollection::decoded(refs)))
                }
                _ => Err(malformed()),
            },
            None => self.inferred(token, raw),
        }
    }

    fn inferred(&mut self, token: Token<'_>, raw: &str) -> Result<Field, CodecError> {
        match token {
            Token::Object(t) => Ok(Field::Reference(Some(self.nested_node(t)?))),
            Token::Array(inner) => {
                let parts = array_parts(inner, raw)?;
                let all_objects = !parts.is_empty()
                    && parts
                        .iter()
                        .all(|p| matches!(classify(p), Ok(Token::Object(_))));
                if all_objects {
                    let refs = self.references(inner, raw)?;
                    Ok(Field::References(ReferenceCollection::decoded(refs)))
                } else {
                    Ok(Field::Elements(self.elements(inner, None, raw)?))
                }
            }
            scalar => Ok(Field::Element(self.inferred_scalar(scalar, raw)?)),
        }
    }

    fn elements(
        &mut self,
        inner: &str,
        kind: Option<ValueKind>,
        raw: &str,
    ) -> Result<Vec<Value>, CodecError> {
        let mut values = Vec::new();
        for part in array_parts(inner, raw)? {
            let token = classify(part)?;
            if matches!(token, Token::Object(_)) {
                return Err(CodecError::MalformedValue(fragment(part)));
            }
            values.push(match kind {
                Some(kind) => self.scalar(token, kind, part)?,
                None => self.inferred_scalar(token, part)?,
            });
        }
        Ok(values)
    }

    fn references(&mut self, inner: &str, raw: &str) -> Result<Vec<ObjectRef>, CodecError> {
        let mut refs = Vec::new();
        for part in array_parts(inner, raw)? {
            match classify(part)? {
                Token::Object(t) => refs.push(self.nested_node(t)?),
                _ => return Err(CodecError::MalformedValue(fragment(part))),
            }
        }
        Ok(refs)
    }

    fn inferred_scalar(&mut self, token: Token<'_>, raw: &str) -> Result<Value, CodecError> {
        Ok(match token {
            Token::Null => Value::Null,
            Token::Bool(b) => Value::Bool(b),
            Token::Quoted(s) => Value::Text(unescape(s)),
            Token::Number(n) => match n.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Decimal(parse_f64(n)?),
            },
            Token::Array(_) | Token::Object(_) => {
                return Err(CodecError::MalformedValue(fragment(raw)))
            }
        })
    }

    /// Interprets a scalar token according to the field's declared kind.
    fn scalar(&mut self, token: Token<'_>, kind: ValueKind, raw: &str) -> Result<Value, CodecError> {
        let malformed = || CodecError::MalformedValue(fragment(raw));

        match token {
            Token::Null => Ok(Value::Null),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Quoted(s) => {
                let text = unescape(s);
                match kind {
                    ValueKind::Text => Ok(Value::Text(text)),
                    ValueKind::Generic => Ok(Value::Raw(text)),
                    ValueKind::DateTime => {
                        text.trim().parse().map(|t| Value::DateTime(Ticks(t))).map_err(|_| malformed())
                    }
                    ValueKind::User => Ok(Value::User(self.user(&text).ok_or_else(malformed)?)),
                    ValueKind::Guid => Uuid::parse_str(&text).map(Value::Guid).map_err(|_| malformed()),
                    ValueKind::Integer => text.trim().parse().map(Value::Int).map_err(|_| malformed()),
                    ValueKind::Decimal => text.trim().parse().map(Value::Decimal).map_err(|_| malformed()),
                    ValueKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
                        "true" => Ok(Value::Bool(true)),
                        "false" => Ok(Value::Bool(false)),
                        _ => Err(malformed()),
                    },
                }
            }
            Token::Number(n) => match kind {
                ValueKind::Integer => n.parse().map(Value::Int).map_err(|_| malformed()),
                ValueKind::Decimal => parse_f64(n).map(Value::Decimal),
                ValueKind::DateTime => n.parse().map(|t| Value::DateTime(Ticks(t))).map_err(|_| malformed()),
                ValueKind::Text => Ok(Value::Text(n.to_string())),
                ValueKind::Generic => Ok(Value::Raw(n.to_string())),
                ValueKind::Bool | ValueKind::User | ValueKind::Guid => Err(malformed()),
            },
            Token::Array(_) => Err(CodecError::NestedArray(fragment(raw))),
            Token::Object(_) => Err(malformed()),
        }
    }

    fn user(&self, text: &str) -> Option<UserRef> {
        let id = Uuid::parse_str(text.trim()).ok()?;
        if id.is_nil() {
            return Some(UserRef::anonymous());
        }
        Some(self.users.find_user(id).unwrap_or_else(|| UserRef::unresolved(id)))
    }
}

/// Splits array contents, rejecting empty slots and arrays of arrays.
fn array_parts<'t>(inner: &'t str, raw: &str) -> Result<Vec<&'t str>, CodecError> {
    let parts = split_top_level(inner, ',')?;
    for part in &parts {
        if part.is_empty() {
            return Err(CodecError::MalformedValue(fragment(raw)));
        }
        if delimited(part, '[', ']').is_some() {
            return Err(CodecError::NestedArray(fragment(raw)));
        }
    }
    Ok(parts)
}

fn parse_f64(n: &str) -> Result<f64, CodecError> {
    n.parse::<f64>()
        .map_err(|_| CodecError::MalformedValue(fragment(n)))
}

fn parse_text(raw: &str) -> Result<String, CodecError> {
    match classify(raw)? {
        Token::Quoted(s) => Ok(unescape(s)),
        _ => Err(CodecError::MalformedValue(fragment(raw))),
    }
}

fn parse_id(raw: &str) -> Result<Uuid, CodecError> {
    let text = parse_text(raw)?;
    Uuid::parse_str(&text).map_err(|_| CodecError::MalformedValue(fragment(raw)))
}

fn parse_bool(raw: &str) -> Result<bool, CodecError> {
    match classify(raw)? {
        Token::Bool(b) => Ok(b),
        Token::Null => Ok(false),
        _ => Err(CodecError::MalformedValue(fragment(raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GraphEncoder;
    use crate::graph::{PersistentObject, RetrievalState, TypeDescriptor};

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                TypeDescriptor::new("Invoice", "invoices")
                    .element("Title", ValueKind::Text)
                    .element("Amount", ValueKind::Decimal)
                    .element("Created", ValueKind::DateTime)
                    .element("Owner", ValueKind::User)
                    .elements("Tags", ValueKind::Text)
                    .reference("Customer")
                    .references("Lines"),
            )
            .with(TypeDescriptor::new("Customer", "customers").element("Name", ValueKind::Text))
            .with(TypeDescriptor::new("Line", "lines").element("Text", ValueKind::Text))
            .with(
                TypeDescriptor::new("Holder", "holders")
                    .reference("First")
                    .reference("Second"),
            )
    }

    fn decode(text: &str, cache: &mut ObjectCache) -> Result<Option<ObjectRef>, CodecError> {
        let registry = registry();
        GraphDecoder::new(&registry, cache).decode_object(text)
    }

    fn line(id: Uuid, text: &str) -> String {
        format!(r#"{{"Id":"{}","Type":"Line","Text":"{}"}}"#, id, text)
    }

    #[test]
    fn test_roundtrip_within_depth() {
        let mut customer = PersistentObject::new("Customer");
        customer.set_element("Name", "Ada {L.}");
        let mut invoice = PersistentObject::new("Invoice");
        invoice.set_element("Title", "A [draft]");
        invoice.set_element("Amount", 12.5);
        invoice.set_element("Created", Ticks(638_000_000_000_000_000));
        invoice.set_elements("Tags", vec![Value::from("x"), Value::from("y,z")]);
        invoice.set_reference("Customer", Some(customer.to_ref()));
        let (invoice_id, customer_id) = (invoice.id(), customer.id());
        let source: ObjectCache = vec![invoice, customer].into_iter().collect();

        let text = GraphEncoder::new(&source).encode_object(invoice_id, 1).unwrap();
        let mut cache = ObjectCache::new();
        let root = decode(&text, &mut cache).unwrap().unwrap();

        assert_eq!(root.id, invoice_id);
        let decoded = cache.get(invoice_id).unwrap();
        let original = source.get(invoice_id).unwrap();
        assert_eq!(decoded.element("Title"), original.element("Title"));
        assert_eq!(decoded.element("Amount"), original.element("Amount"));
        assert_eq!(decoded.element("Created"), original.element("Created"));
        assert_eq!(decoded.elements("Tags"), original.elements("Tags"));
        assert_eq!(
            cache.get(customer_id).unwrap().element("Name"),
            Some(&Value::from("Ada {L.}"))
        );
        assert!(decoded.is_attached());
    }

    #[test]
    fn test_beyond_depth_is_stub() {
        let mut customer = PersistentObject::new("Customer");
        customer.set_element("Name", "Ada");
        let mut invoice = PersistentObject::new("Invoice");
        invoice.set_reference("Customer", Some(customer.to_ref()));
        let (invoice_id, customer_id) = (invoice.id(), customer.id());
        let source: ObjectCache = vec![invoice, customer].into_iter().collect();

        let text = GraphEncoder::new(&source).encode_object(invoice_id, 0).unwrap();
        let mut cache = ObjectCache::new();
        decode(&text, &mut cache).unwrap();

        let stub = cache.get(customer_id).unwrap();
        assert_eq!(stub.state(), RetrievalState::Stub);
        assert!(stub.element("Name").is_none());
        assert_eq!(cache.get(invoice_id).unwrap().state(), RetrievalState::Complete);
    }

    #[test]
    fn test_shared_references_collapse() {
        let customer = Uuid::new_v4();
        let text = format!(
            r#"{{"Id":"{}","Type":"Holder","First":{{"Id":"{c}","Type":"Customer","Name":"Ada"}},"Second":{{"Id":"{c}","Type":"Customer"}}}}"#,
            Uuid::new_v4(),
            c = customer
        );
        let mut cache = ObjectCache::new();
        let root = decode(&text, &mut cache).unwrap().unwrap();

        assert_eq!(cache.len(), 2);
        let holder = cache.get(root.id).unwrap();
        assert_eq!(holder.reference("First"), holder.reference("Second"));
        assert_eq!(
            cache.get(customer).unwrap().element("Name"),
            Some(&Value::from("Ada"))
        );
    }

    #[test]
    fn test_forced_retrieval_consumed_by_first_occurrence() {
        let invoice = Uuid::new_v4();
        let target = Uuid::new_v4();
        let mut cache = ObjectCache::new();

        // A bare stub comes first and consumes the directive; the next
        // occurrence completes the node and the last one is ignored.
        let text = format!(
            r#"{{"Id":"{}","Type":"Invoice","Lines":[{{"Id":"{t}","Type":"Line"}},{},{}]}}"#,
            invoice,
            line(target, "early"),
            line(target, "late"),
            t = target
        );
        let registry = registry();
        let mut decoder = GraphDecoder::new(&registry, &mut cache).force(Some(target));
        decoder.decode_object(&text).unwrap();
        assert_eq!(decoder.pending_force(), None);

        assert_eq!(
            cache.get(target).unwrap().element("Text"),
            Some(&Value::from("early"))
        );
    }

    #[test]
    fn test_node_completed_by_earlier_decode_is_refreshed() {
        let target = Uuid::new_v4();
        let mut cache = ObjectCache::new();
        let mut existing = PersistentObject::stub(target, "Customer");
        existing.set_element("Name", "old");
        existing.begin_refresh();
        assert_eq!(existing.state(), RetrievalState::Complete);
        cache.insert(existing);

        let text = format!(r#"{{"Id":"{}","Type":"Customer","Name":"new"}}"#, target);
        decode(&text, &mut cache).unwrap();
        assert_eq!(cache.get(target).unwrap().element("Name"), Some(&Value::from("new")));

        let newer = format!(r#"{{"Id":"{}","Type":"Customer","Name":"newer"}}"#, target);
        let registry = registry();
        GraphDecoder::new(&registry, &mut cache)
            .force(Some(target))
            .decode_object(&newer)
            .unwrap();
        assert_eq!(cache.get(target).unwrap().element("Name"), Some(&Value::from("newer")));
    }

    #[test]
    fn test_second_decode_replaces_collections_once() {
        let invoice = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut cache = ObjectCache::new();

        let first = format!(
            r#"{{"Id":"{}","Type":"Invoice","Tags":["x"],"Lines":[{},{}]}}"#,
            invoice,
            line(a, "one"),
            line(b, "two")
        );
        decode(&first, &mut cache).unwrap();
        assert_eq!(cache.get(invoice).unwrap().references("Lines").unwrap().items().len(), 2);

        // The invoice shows up again through its own line; that occurrence
        // must not clear what the first one just assigned.
        let second = format!(
            r#"{{"Id":"{inv}","Type":"Invoice","Tags":["y"],"Lines":[{{"Id":"{c}","Type":"Line","Text":"three","Owner":{{"Id":"{inv}","Type":"Invoice","Lines":[{}]}}}}]}}"#,
            line(a, "one"),
            inv = invoice,
            c = c
        );
        let registry = registry();
        GraphDecoder::new(&registry, &mut cache)
            .force(Some(invoice))
            .decode_object(&second)
            .unwrap();

        let node = cache.get(invoice).unwrap();
        assert_eq!(node.state(), RetrievalState::Complete);
        assert_eq!(node.elements("Tags"), &[Value::from("y")]);
        let lines = node.references("Lines").unwrap();
        let ids: Vec<Uuid> = lines.items().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c]);
        assert_eq!(lines.initial(), lines.items());
    }

    #[test]
    fn test_refresh_replaces_partial_collection_once() {
        let invoice = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut cache = ObjectCache::new();
        let mut partial = PersistentObject::stub(invoice, "Invoice");
        partial.push_reference("Lines", ObjectRef::new(a, "Line"));
        assert_eq!(partial.state(), RetrievalState::Partial);
        cache.insert(partial);

        let text = format!(
            r#"{{"Id":"{}","Type":"Invoice","Lines":[{},{}],"Title":"t"}}"#,
            invoice,
            line(b, "one"),
            line(c, "two")
        );
        let registry = registry();
        GraphDecoder::new(&registry, &mut cache)
            .force(Some(invoice))
            .decode_object(&text)
            .unwrap();

        let node = cache.get(invoice).unwrap();
        assert_eq!(node.state(), RetrievalState::Complete);
        let lines = node.references("Lines").unwrap();
        let ids: Vec<Uuid> = lines.items().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(lines.initial(), lines.items());
    }

    #[test]
    fn test_local_side_attaches_known_ids_only() {
        struct Known(HashSet<Uuid>);
        impl StoreIndex for Known {
            fn contains_id(&self, id: Uuid) -> bool {
                self.0.contains(&id)
            }
        }

        let (known, unknown) = (Uuid::new_v4(), Uuid::new_v4());
        let index = Known(std::iter::once(known).collect());
        let text = format!(
            r#"{{"Id":"{}","Type":"Holder","First":{{"Id":"{}","Type":"Customer"}}}}"#,
            unknown, known
        );
        let registry = registry();
        let mut cache = ObjectCache::new();
        GraphDecoder::new(&registry, &mut cache)
            .local(&index)
            .decode_object(&text)
            .unwrap();

        assert!(cache.get(known).unwrap().is_attached());
        assert!(!cache.get(unknown).unwrap().is_attached());
    }

    #[test]
    fn test_user_lookup_falls_back_to_anonymous() {
        let text = format!(
            r#"{{"Id":"{}","Type":"Invoice","Owner":"{}"}}"#,
            Uuid::new_v4(),
            Uuid::nil()
        );
        let mut cache = ObjectCache::new();
        let root = decode(&text, &mut cache).unwrap().unwrap();
        assert_eq!(
            cache.get(root.id).unwrap().element("Owner"),
            Some(&Value::User(UserRef::anonymous()))
        );
    }

    #[test]
    fn test_undeclared_fields_are_inferred() {
        let text = format!(
            r#"{{"Id":"{}","Type":"Customer","Age":42,"Score":1.5,"Vip":TRUE,"Aliases":["a","b"],"Note":null}}"#,
            Uuid::new_v4()
        );
        let mut cache = ObjectCache::new();
        let root = decode(&text, &mut cache).unwrap().unwrap();
        let node = cache.get(root.id).unwrap();
        assert_eq!(node.element("Age"), Some(&Value::Int(42)));
        assert_eq!(node.element("Score"), Some(&Value::Decimal(1.5)));
        assert_eq!(node.element("Vip"), Some(&Value::Bool(true)));
        assert_eq!(node.elements("Aliases"), &[Value::from("a"), Value::from("b")]);
        assert_eq!(node.element("Note"), Some(&Value::Null));
    }

    #[test]
    fn test_null_and_empty_decode_to_nothing() {
        let mut cache = ObjectCache::new();
        assert_eq!(decode("null", &mut cache).unwrap(), None);
        assert_eq!(decode("  ", &mut cache).unwrap(), None);
    }

    #[test]
    fn test_format_errors() {
        let id = Uuid::new_v4();
        let mut cache = ObjectCache::new();

        assert!(matches!(
            decode(r#"{"Type":"Customer","Name":"x"}"#, &mut cache),
            Err(CodecError::MissingId(_))
        ));
        assert!(matches!(
            decode(&format!(r#"{{"Id":"{}",Type:"Customer"}}"#, id), &mut cache),
            Err(CodecError::MalformedKey(_))
        ));
        assert!(matches!(
            decode(&format!(r#"{{"Id":"{}","Type":"Customer","Name"}}"#, id), &mut cache),
            Err(CodecError::MalformedProperty(_))
        ));
        assert!(matches!(
            decode(&format!(r#"{{"Id":"{}","Type":"Customer","M":[[1],[2]]}}"#, id), &mut cache),
            Err(CodecError::NestedArray(_))
        ));
        assert!(matches!(
            decode(&format!(r#"{{"Id":"{}","Type":"Customer","Name":oops}}"#, id), &mut cache),
            Err(CodecError::MalformedValue(_))
        ));
        assert!(matches!(
            decode(r#"[{"Id":"x"}]"#, &mut cache),
            Err(CodecError::NotAnObject(_))
        ));
        assert!(matches!(
            decode(&format!(r#"{{"Id":"{}","Type":"Spaceship"}}"#, id), &mut cache),
            Err(CodecError::UnknownType(tag)) if tag == "Spaceship"
        ));
    }

    #[test]
    fn test_missing_type_for_uncached_node() {
        let mut cache = ObjectCache::new();
        let text = format!(r#"{{"Id":"{}","Name":"x"}}"#, Uuid::new_v4());
        assert!(matches!(decode(&text, &mut cache), Err(CodecError::MissingType(_))));
    }
}
