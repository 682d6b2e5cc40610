//! Result variants attached to responses.

use super::tags;
use crate::codec::{CodecError, Item, Record};
use crate::graph::{ObjectRef, Value};

/// The closed set of response payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResult {
    Bool(bool),
    NullableBool(Option<bool>),
    Int(i64),
    String(Option<String>),
    ListOfString(Vec<String>),
    ListOfPersistentObject(Vec<ObjectRef>),
    PersistentObject(Option<ObjectRef>),
    /// Sums and averages, one per requested field.
    ListOfDecimal(Vec<f64>),
    /// Distinct field values.
    ListOfValue(Vec<Value>),
    /// Opaque text blob passed through untouched.
    Object(Option<String>),
}

impl RpcResult {
    /// Wire tag naming the variant.
    pub fn tag(&self) -> &'static str {
        match self {
            RpcResult::Bool(_) => tags::BOOL_RESULT,
            RpcResult::NullableBool(_) => tags::NULLABLE_BOOL_RESULT,
            RpcResult::Int(_) => tags::INT_RESULT,
            RpcResult::String(_) => tags::STRING_RESULT,
            RpcResult::ListOfString(_) => tags::LIST_OF_STRING_RESULT,
            RpcResult::ListOfPersistentObject(_) => tags::LIST_OF_PERSISTENT_OBJECT_RESULT,
            RpcResult::PersistentObject(_) => tags::PERSISTENT_OBJECT_RESULT,
            RpcResult::ListOfDecimal(_) => tags::LIST_OF_DECIMAL_RESULT,
            RpcResult::ListOfValue(_) => tags::LIST_OF_VALUE_RESULT,
            RpcResult::Object(_) => tags::OBJECT_RESULT,
        }
    }

    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        self.tag().trim_end_matches("Result")
    }

    pub fn to_record(&self) -> Record {
        let value: Item = match self {
            RpcResult::Bool(b) => Item::Bool(*b),
            RpcResult::NullableBool(b) => (*b).into(),
            RpcResult::Int(i) => Item::Int(*i),
            RpcResult::String(s) | RpcResult::Object(s) => s.clone().into(),
            RpcResult::ListOfString(v) => v.clone().into(),
            RpcResult::ListOfPersistentObject(v) => v.clone().into(),
            RpcResult::PersistentObject(r) => r.clone().into(),
            RpcResult::ListOfDecimal(v) => v.clone().into(),
            RpcResult::ListOfValue(v) => Item::List(v.iter().map(Item::from).collect()),
        };
        Record::new(self.tag()).with("Value", value)
    }

    /// Reads a result back from a decoded record. Every variant keeps its
    /// payload in a single `Value` property.
    pub fn from_record(mut r: Record) -> Result<Self, CodecError> {
        let tag = r.type_tag.clone();
        Ok(match tag.as_str() {
            tags::BOOL_RESULT => RpcResult::Bool(r.bool("Value")?),
            tags::NULLABLE_BOOL_RESULT => RpcResult::NullableBool(r.opt_bool("Value")?),
            tags::INT_RESULT => RpcResult::Int(r.int("Value")?),
            tags::STRING_RESULT => RpcResult::String(r.opt_text("Value")?),
            tags::OBJECT_RESULT => RpcResult::Object(r.opt_text("Value")?),
            tags::PERSISTENT_OBJECT_RESULT => RpcResult::PersistentObject(r.opt_node("Value")?),
            tags::LIST_OF_STRING_RESULT => RpcResult::ListOfString(list(&mut r, |item| match item {
                Item::Text(s) => Ok(s),
                other => Err(other),
            })?),
            tags::LIST_OF_PERSISTENT_OBJECT_RESULT => {
                RpcResult::ListOfPersistentObject(list(&mut r, |item| match item {
                    Item::Node(n) => Ok(n),
                    other => Err(other),
                })?)
            }
            tags::LIST_OF_DECIMAL_RESULT => RpcResult::ListOfDecimal(list(&mut r, |item| match item {
                Item::Int(i) => Ok(i as f64),
                Item::Decimal(d) => Ok(d),
                other => Err(other),
            })?),
            tags::LIST_OF_VALUE_RESULT => RpcResult::ListOfValue(list(&mut r, |item| {
                item.clone().into_value().ok_or(item)
            })?),
            other => return Err(CodecError::invalid_record(other, "not a result variant")),
        })
    }
}

fn list<T>(
    record: &mut Record,
    convert: impl Fn(Item) -> Result<T, Item>,
) -> Result<Vec<T>, CodecError> {
    record
        .list("Value")?
        .into_iter()
        .map(|item| convert(item).map_err(|bad| record.element_error("Value", &bad)))
        .collect()
}
