use super::error::CodecError;
use super::escape::quote;
use super::record::{Item, Record};
use crate::graph::{Field, ObjectCache, ObjectRef, Value};
use crate::protocol::Message;
use std::fmt::Write;
use uuid::Uuid;

/// Writes nodes and messages as wire text.
///
/// Encoding is a pure function of the cache contents and the depth. A node
/// emits `Id`, `Type`, `IsRemoved` (only when true) and then its fields in
/// name order. References are expanded while depth remains; at depth zero
/// they are written as `{"Id":..,"Type":..}` stubs. References missing from
/// the cache are always written as stubs.
pub struct GraphEncoder<'a> {
    cache: &'a ObjectCache,
}

impl<'a> GraphEncoder<'a> {
    /// Create an encoder reading nodes from `cache`.
    pub fn new(cache: &'a ObjectCache) -> Self {
        Self { cache }
    }

    /// Encodes one cached node with its references expanded `depth` levels.
    pub fn encode_object(&self, id: Uuid, depth: u32) -> Result<String, CodecError> {
        let node = self.cache.get(id).ok_or(CodecError::UnknownObject(id))?;
        let mut out = String::with_capacity(256);
        self.write_node(&mut out, &node.to_ref(), depth, true)?;
        Ok(out)
    }

    /// Encodes a message. Transient records do not consume depth; only the
    /// domain nodes they carry do.
    pub fn encode_message(&self, message: &Message, depth: u32) -> Result<String, CodecError> {
        self.encode_record(&message.to_record(), depth)
    }

    /// Encodes any transient record, with the domain nodes it carries
    /// expanded `depth` levels.
    pub fn encode_record(&self, record: &Record, depth: u32) -> Result<String, CodecError> {
        let mut out = String::with_capacity(256);
        self.write_record(&mut out, record, depth)?;
        Ok(out)
    }

    fn write_header(out: &mut String, id: Uuid, type_tag: &str) {
        let _ = write!(out, "{{\"Id\":\"{}\",\"Type\":{}", id, quote(type_tag));
    }

    fn write_node(
        &self,
        out: &mut String,
        target: &ObjectRef,
        depth: u32,
        expand: bool,
    ) -> Result<(), CodecError> {
        let node = match self.cache.resolve(target) {
            Some(node) if expand => node,
            _ => {
                Self::write_header(out, target.id, &target.type_tag);
                out.push('}');
                return Ok(());
            }
        };

        Self::write_header(out, node.id(), node.type_tag());
        if node.is_removed() {
            out.push_str(",\"IsRemoved\":true");
        }

        let child_depth = depth.saturating_sub(1);
        for (name, field) in node.fields() {
            out.push(',');
            out.push_str(&quote(name));
            out.push(':');
            match field {
                Field::Element(value) => write_value(out, value)?,
                Field::Reference(None) => out.push_str("null"),
                Field::Reference(Some(r)) => self.write_node(out, r, child_depth, depth > 0)?,
                Field::Elements(values) => {
                    out.push('[');
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        write_value(out, value)?;
                    }
                    out.push(']');
                }
                Field::References(rc) => {
                    out.push('[');
                    for (i, r) in rc.items().iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        self.write_node(out, r, child_depth, depth > 0)?;
                    }
                    out.push(']');
                }
            }
        }
        out.push('}');
        Ok(())
    }

    fn write_record(&self, out: &mut String, record: &Record, depth: u32) -> Result<(), CodecError> {
        Self::write_header(out, record.id, &record.type_tag);
        for (name, item) in &record.fields {
            out.push(',');
            out.push_str(&quote(name));
            out.push(':');
            self.write_item(out, item, depth)?;
        }
        out.push('}');
        Ok(())
    }

    fn write_item(&self, out: &mut String, item: &Item, depth: u32) -> Result<(), CodecError> {
        match item {
            Item::Null => out.push_str("null"),
            Item::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Item::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            Item::Decimal(d) => write_decimal(out, *d)?,
            Item::Text(s) => out.push_str(&quote(s)),
            Item::Node(r) => self.write_node(out, r, depth, true)?,
            Item::Record(r) => self.write_record(out, r, depth)?,
            Item::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_item(out, item, depth)?;
                }
                out.push(']');
            }
        }
        Ok(())
    }
}

fn write_decimal(out: &mut String, d: f64) -> Result<(), CodecError> {
    if !d.is_finite() {
        return Err(CodecError::NonFiniteNumber(d));
    }
    // f64's Display never uses exponents or separators. Whole values keep a
    // fraction so they decode as decimals again.
    if d.fract() == 0.0 {
        let _ = write!(out, "{:.1}", d);
    } else {
        let _ = write!(out, "{}", d);
    }
    Ok(())
}

/// Writes one element value.
pub fn write_value(out: &mut String, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Decimal(d) => write_decimal(out, *d)?,
        Value::DateTime(ticks) => {
            let _ = write!(out, "{}", ticks.0);
        }
        Value::User(user) => {
            let _ = write!(out, "\"{}\"", user.id);
        }
        Value::Guid(id) => {
            let _ = write!(out, "\"{}\"", id);
        }
        Value::Text(s) | Value::Raw(s) => out.push_str(&quote(s)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GraphDecoder;
    use crate::graph::{PersistentObject, Ticks, TypeDescriptor, TypeRegistry, UserRef};

    fn invoice(id: &str) -> PersistentObject {
        PersistentObject::stub(Uuid::parse_str(id).unwrap(), "Invoice")
    }

    #[test]
    fn test_encode_escapes_title() {
        let mut node = invoice("01234567-89ab-cdef-0123-456789abcdef");
        node.set_element("Title", "A [draft]");
        let cache: ObjectCache = std::iter::once(node).collect();

        let text = GraphEncoder::new(&cache)
            .encode_object(Uuid::parse_str("01234567-89ab-cdef-0123-456789abcdef").unwrap(), 1)
            .unwrap();
        assert_eq!(
            text,
            r#"{"Id":"01234567-89ab-cdef-0123-456789abcdef","Type":"Invoice","Title":"A \[draft\]"}"#
        );
    }

    #[test]
    fn test_fields_in_name_order_and_removed_flag() {
        let mut node = invoice("00000000-0000-0000-0000-000000000001");
        node.set_element("Zeta", 1i64);
        node.set_element("Alpha", true);
        node.set_removed(true);
        let id = node.id();
        let cache: ObjectCache = std::iter::once(node).collect();

        let text = GraphEncoder::new(&cache).encode_object(id, 0).unwrap();
        assert_eq!(
            text,
            r#"{"Id":"00000000-0000-0000-0000-000000000001","Type":"Invoice","IsRemoved":true,"Alpha":true,"Zeta":1}"#
        );
    }

    #[test]
    fn test_scalar_encodings() {
        let mut out = String::new();
        write_value(&mut out, &Value::Decimal(1234.5)).unwrap();
        out.push(' ');
        write_value(&mut out, &Value::DateTime(Ticks(630_000_000_000_000_000))).unwrap();
        out.push(' ');
        write_value(&mut out, &Value::User(UserRef::anonymous())).unwrap();
        assert_eq!(out, r#"1234.5 630000000000000000 "00000000-0000-0000-0000-000000000000""#);
    }

    #[test]
    fn test_whole_decimals_stay_decimals() {
        let mut source = PersistentObject::new("Invoice");
        source.set_element("Amount", Value::Decimal(3.0));
        source.set_elements("Rates", vec![Value::Decimal(-2.0), Value::Decimal(0.25)]);
        let id = source.id();
        let cache: ObjectCache = std::iter::once(source).collect();

        let text = GraphEncoder::new(&cache).encode_object(id, 0).unwrap();
        assert!(text.contains(r#""Amount":3.0"#), "{}", text);

        // Undeclared fields are inferred from the text alone.
        let registry = TypeRegistry::new().with(TypeDescriptor::new("Invoice", "invoices"));
        let mut decoded = ObjectCache::new();
        GraphDecoder::new(&registry, &mut decoded).decode_object(&text).unwrap();
        let node = decoded.get(id).unwrap();
        assert_eq!(node.element("Amount"), Some(&Value::Decimal(3.0)));
        assert_eq!(node.elements("Rates"), &[Value::Decimal(-2.0), Value::Decimal(0.25)]);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut out = String::new();
        assert!(matches!(
            write_value(&mut out, &Value::Decimal(f64::NAN)),
            Err(CodecError::NonFiniteNumber(_))
        ));
    }

    #[test]
    fn test_depth_limits_expansion() {
        let mut customer = PersistentObject::new("Customer");
        customer.set_element("Name", "Ada");
        let mut order = PersistentObject::new("Order");
        order.set_reference("Customer", Some(customer.to_ref()));
        let order_id = order.id();
        let cache: ObjectCache = vec![customer, order].into_iter().collect();
        let encoder = GraphEncoder::new(&cache);

        let shallow = encoder.encode_object(order_id, 0).unwrap();
        assert!(!shallow.contains("Ada"));
        assert!(shallow.contains(r#""Type":"Customer"}"#));

        let deep = encoder.encode_object(order_id, 1).unwrap();
        assert!(deep.contains(r#""Name":"Ada""#));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut a = PersistentObject::new("Node");
        let mut b = PersistentObject::new("Node");
        a.set_reference("Next", Some(b.to_ref()));
        b.set_reference("Next", Some(a.to_ref()));
        let a_id = a.id();
        let cache: ObjectCache = vec![a, b].into_iter().collect();

        let text = GraphEncoder::new(&cache).encode_object(a_id, 3).unwrap();
        assert_eq!(text.matches("\"Next\"").count(), 4);
    }

    #[test]
    fn test_unknown_object() {
        let cache = ObjectCache::new();
        assert!(matches!(
            GraphEncoder::new(&cache).encode_object(Uuid::new_v4(), 1),
            Err(CodecError::UnknownObject(_))
        ));
    }
}
