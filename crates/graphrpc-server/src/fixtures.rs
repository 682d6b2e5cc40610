//! Domain types shared by the unit tests.

use graphrpc_common::graph::{
    DomainType, ObjectRef, PersistentObject, TypeDescriptor, TypeRegistry, ValueKind,
};

pub struct Invoice;

impl DomainType for Invoice {
    const TYPE_TAG: &'static str = "Invoice";

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_TAG, "invoices")
            .element("Title", ValueKind::Text)
            .element("Amount", ValueKind::Decimal)
            .reference("Customer")
            .references("Lines")
    }
}

pub struct Line;

impl DomainType for Line {
    const TYPE_TAG: &'static str = "Line";

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_TAG, "lines")
            .element("Quantity", ValueKind::Integer)
            .element("Price", ValueKind::Decimal)
    }
}

pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_type::<Invoice>().register_type::<Line>();
    registry
}

pub fn invoice(title: &str, amount: f64) -> PersistentObject {
    let mut invoice = PersistentObject::new(Invoice::TYPE_TAG);
    invoice.set_element("Title", title);
    invoice.set_element("Amount", amount);
    invoice
}

pub fn line(quantity: i64, price: f64) -> PersistentObject {
    let mut line = PersistentObject::new(Line::TYPE_TAG);
    line.set_element("Quantity", quantity);
    line.set_element("Price", price);
    line
}

/// An invoice holding `lines`, with every node returned.
pub fn invoice_with_lines(title: &str, lines: Vec<PersistentObject>) -> (PersistentObject, Vec<PersistentObject>) {
    let mut root = invoice(title, 0.0);
    root.set_references("Lines", lines.iter().map(PersistentObject::to_ref).collect::<Vec<ObjectRef>>());
    (root, lines)
}
