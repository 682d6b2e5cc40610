//! Transient protocol records.
//!
//! Messages, parameters, results, filters and sort criteria travel as objects
//! with an `Id` and a `Type` just like domain nodes, but they are never
//! registered in the object cache. The codec reads and writes them through
//! this untyped form; the protocol types convert to and from it.

use super::error::CodecError;
use crate::graph::{ObjectRef, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One value inside a transient record.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
    /// A domain node, expanded according to the remaining depth.
    Node(ObjectRef),
    /// A nested transient record.
    Record(Record),
    List(Vec<Item>),
}

impl Item {
    /// Loose conversion into an element value.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Item::Null => Some(Value::Null),
            Item::Bool(b) => Some(Value::Bool(b)),
            Item::Int(i) => Some(Value::Int(i)),
            Item::Decimal(d) => Some(Value::Decimal(d)),
            Item::Text(s) => Some(Value::Text(s)),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Item::Null => "null",
            Item::Bool(_) => "bool",
            Item::Int(_) => "integer",
            Item::Decimal(_) => "decimal",
            Item::Text(_) => "text",
            Item::Node(_) => "object",
            Item::Record(_) => "record",
            Item::List(_) => "list",
        }
    }
}

impl From<&Value> for Item {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Item::Null,
            Value::Bool(b) => Item::Bool(*b),
            Value::Int(i) => Item::Int(*i),
            Value::Decimal(d) => Item::Decimal(*d),
            Value::DateTime(t) => Item::Int(t.0),
            Value::User(u) => Item::Text(u.id.to_string()),
            Value::Guid(g) => Item::Text(g.to_string()),
            Value::Text(s) | Value::Raw(s) => Item::Text(s.clone()),
        }
    }
}

impl From<bool> for Item {
    fn from(b: bool) -> Self {
        Item::Bool(b)
    }
}

impl From<i64> for Item {
    fn from(i: i64) -> Self {
        Item::Int(i)
    }
}

impl From<f64> for Item {
    fn from(d: f64) -> Self {
        Item::Decimal(d)
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item::Text(s.to_string())
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Item::Text(s)
    }
}

impl From<Uuid> for Item {
    fn from(id: Uuid) -> Self {
        Item::Text(id.to_string())
    }
}

impl From<ObjectRef> for Item {
    fn from(r: ObjectRef) -> Self {
        Item::Node(r)
    }
}

impl From<Record> for Item {
    fn from(r: Record) -> Self {
        Item::Record(r)
    }
}

impl<T: Into<Item>> From<Option<T>> for Item {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Item::Null)
    }
}

impl<T: Into<Item>> From<Vec<T>> for Item {
    fn from(v: Vec<T>) -> Self {
        Item::List(v.into_iter().map(Into::into).collect())
    }
}

/// A transient record: id, tag and named items in wire (name) order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub type_tag: String,
    pub fields: BTreeMap<String, Item>,
}

impl Record {
    /// A record with a fresh id.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), type_tag)
    }

    /// A record keeping a known id, such as the correlation id of a message.
    pub fn with_id(id: Uuid, type_tag: impl Into<String>) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a named item, replacing any previous one.
    pub fn with(mut self, name: impl Into<String>, item: impl Into<Item>) -> Self {
        self.fields.insert(name.into(), item.into());
        self
    }

    fn missing(&self, name: &str) -> CodecError {
        CodecError::invalid_record(&self.type_tag, format!("missing field '{}'", name))
    }

    fn mismatch(&self, name: &str, expected: &str, found: &Item) -> CodecError {
        CodecError::invalid_record(
            &self.type_tag,
            format!("field '{}': expected {}, found {}", name, expected, found.kind()),
        )
    }

    /// Removes a field; absent fields read as null.
    pub fn take(&mut self, name: &str) -> Item {
        self.fields.remove(name).unwrap_or(Item::Null)
    }

    /// Takes a text field; null reads as `None`.
    ///
    /// # Returns
    ///
    /// An `InvalidRecord` error naming the field when it holds a bool, list,
    /// record or node
    pub fn opt_text(&mut self, name: &str) -> Result<Option<String>, CodecError> {
        match self.take(name) {
            Item::Null => Ok(None),
            Item::Text(s) => Ok(Some(s)),
            // Unquoted numbers are accepted where text is expected.
            Item::Int(i) => Ok(Some(i.to_string())),
            Item::Decimal(d) => Ok(Some(d.to_string())),
            other => Err(self.mismatch(name, "text", &other)),
        }
    }

    pub fn text(&mut self, name: &str) -> Result<String, CodecError> {
        self.opt_text(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn uuid(&mut self, name: &str) -> Result<Uuid, CodecError> {
        let text = self.text(name)?;
        Uuid::parse_str(&text).map_err(|_| {
            CodecError::invalid_record(
                &self.type_tag,
                format!("field '{}': '{}' is not an id", name, text),
            )
        })
    }

    pub fn opt_bool(&mut self, name: &str) -> Result<Option<bool>, CodecError> {
        match self.take(name) {
            Item::Null => Ok(None),
            Item::Bool(b) => Ok(Some(b)),
            other => Err(self.mismatch(name, "bool", &other)),
        }
    }

    pub fn bool(&mut self, name: &str) -> Result<bool, CodecError> {
        self.opt_bool(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn int(&mut self, name: &str) -> Result<i64, CodecError> {
        match self.take(name) {
            Item::Int(i) => Ok(i),
            Item::Null => Err(self.missing(name)),
            other => Err(self.mismatch(name, "integer", &other)),
        }
    }

    pub fn decimal(&mut self, name: &str) -> Result<f64, CodecError> {
        match self.take(name) {
            Item::Int(i) => Ok(i as f64),
            Item::Decimal(d) => Ok(d),
            Item::Null => Err(self.missing(name)),
            other => Err(self.mismatch(name, "decimal", &other)),
        }
    }

    pub fn opt_node(&mut self, name: &str) -> Result<Option<ObjectRef>, CodecError> {
        match self.take(name) {
            Item::Null => Ok(None),
            Item::Node(r) => Ok(Some(r)),
            other => Err(self.mismatch(name, "persistent object", &other)),
        }
    }

    pub fn node(&mut self, name: &str) -> Result<ObjectRef, CodecError> {
        self.opt_node(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn opt_record(&mut self, name: &str) -> Result<Option<Record>, CodecError> {
        match self.take(name) {
            Item::Null => Ok(None),
            Item::Record(r) => Ok(Some(r)),
            other => Err(self.mismatch(name, "record", &other)),
        }
    }

    pub fn record(&mut self, name: &str) -> Result<Record, CodecError> {
        self.opt_record(name)?.ok_or_else(|| self.missing(name))
    }

    /// A list field; null reads as empty.
    pub fn list(&mut self, name: &str) -> Result<Vec<Item>, CodecError> {
        match self.take(name) {
            Item::Null => Ok(Vec::new()),
            Item::List(items) => Ok(items),
            other => Err(self.mismatch(name, "list", &other)),
        }
    }

    /// Wraps a conversion failure of one list element.
    pub fn element_error(&self, name: &str, found: &Item) -> CodecError {
        self.mismatch(name, "list element", found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let id = Uuid::new_v4();
        let mut record = Record::new("ById")
            .with("ObjectId", id)
            .with("Max", 10i64)
            .with("Flag", true);

        assert_eq!(record.uuid("ObjectId").unwrap(), id);
        assert_eq!(record.int("Max").unwrap(), 10);
        assert!(record.bool("Flag").unwrap());
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_missing_and_mismatched_fields() {
        let mut record = Record::new("ById").with("ObjectId", true);
        let err = record.uuid("ObjectId").unwrap_err();
        assert!(err.to_string().contains("expected text"));

        let err = record.uuid("ObjectId").unwrap_err();
        assert!(err.to_string().contains("missing field 'ObjectId'"));
    }

    #[test]
    fn test_null_list_reads_empty() {
        let mut record = Record::new("SortCriterion");
        assert!(record.list("Sort").unwrap().is_empty());
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(Item::from(&Value::Int(4)), Item::Int(4));
        assert_eq!(Item::Int(4).into_value(), Some(Value::Int(4)));
        assert_eq!(Item::List(Vec::new()).into_value(), None);
    }
}
