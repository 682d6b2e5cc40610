//! Filter and sort criteria carried by query parameters.

use super::tags;
use crate::codec::{CodecError, Item, Record};
use crate::graph::Value;
use std::cmp::Ordering;

/// Comparison applied by [`Filter::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
    StartsWith,
}

impl CompareOp {
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Equal => "Equal",
            CompareOp::NotEqual => "NotEqual",
            CompareOp::Less => "Less",
            CompareOp::LessOrEqual => "LessOrEqual",
            CompareOp::Greater => "Greater",
            CompareOp::GreaterOrEqual => "GreaterOrEqual",
            CompareOp::Contains => "Contains",
            CompareOp::StartsWith => "StartsWith",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Equal" => CompareOp::Equal,
            "NotEqual" => CompareOp::NotEqual,
            "Less" => CompareOp::Less,
            "LessOrEqual" => CompareOp::LessOrEqual,
            "Greater" => CompareOp::Greater,
            "GreaterOrEqual" => CompareOp::GreaterOrEqual,
            "Contains" => CompareOp::Contains,
            "StartsWith" => CompareOp::StartsWith,
            _ => return None,
        })
    }

    fn test(self, actual: &Value, expected: &Value) -> bool {
        match self {
            CompareOp::Contains => text_of(actual).contains(&text_of(expected)),
            CompareOp::StartsWith => text_of(actual).starts_with(&text_of(expected)),
            _ => {
                let Some(ordering) = actual.compare(expected) else {
                    return false;
                };
                match self {
                    CompareOp::Equal => ordering == Ordering::Equal,
                    CompareOp::NotEqual => ordering != Ordering::Equal,
                    CompareOp::Less => ordering == Ordering::Less,
                    CompareOp::LessOrEqual => ordering != Ordering::Greater,
                    CompareOp::Greater => ordering == Ordering::Greater,
                    CompareOp::GreaterOrEqual => ordering != Ordering::Less,
                    CompareOp::Contains | CompareOp::StartsWith => false,
                }
            }
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string().to_lowercase(),
    }
}

/// A predicate over the named fields of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Compare {
        field_name: String,
        operator: CompareOp,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Compares one field against a constant.
    pub fn compare(field_name: impl Into<String>, operator: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            field_name: field_name.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shorthand for an [`CompareOp::Equal`] comparison.
    ///
    /// # Example
    ///
    /// ```
    /// use graphrpc_common::graph::Value;
    /// use graphrpc_common::protocol::Filter;
    ///
    /// let filter = Filter::eq("Title", "A");
    /// let title = |name: &str| (name == "Title").then(|| Value::from("A"));
    /// assert!(filter.matches(&title));
    /// assert!(!filter.negate().matches(&title));
    /// ```
    pub fn eq(field_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field_name, CompareOp::Equal, value)
    }

    /// Matches exactly what `self` does not.
    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Evaluates the filter; `field` returns the value of a named field, or
    /// `None` when the object has no such field (treated as null).
    pub fn matches(&self, field: &dyn Fn(&str) -> Option<Value>) -> bool {
        match self {
            Filter::All => true,
            Filter::Compare {
                field_name,
                operator,
                value,
            } => {
                let actual = field(field_name).unwrap_or(Value::Null);
                operator.test(&actual, value)
            }
            Filter::And(operands) => operands.iter().all(|f| f.matches(field)),
            Filter::Or(operands) => operands.iter().any(|f| f.matches(field)),
            Filter::Not(operand) => !operand.matches(field),
        }
    }

    pub fn to_record(&self) -> Record {
        match self {
            Filter::All => Record::new(tags::FILTER_ALL),
            Filter::Compare {
                field_name,
                operator,
                value,
            } => Record::new(tags::FILTER_COMPARE)
                .with("FieldName", field_name.as_str())
                .with("Operator", operator.name())
                .with("Value", Item::from(value)),
            Filter::And(operands) => Record::new(tags::FILTER_AND).with("Operands", operand_list(operands)),
            Filter::Or(operands) => Record::new(tags::FILTER_OR).with("Operands", operand_list(operands)),
            Filter::Not(operand) => Record::new(tags::FILTER_NOT).with("Operand", operand.to_record()),
        }
    }

    pub fn from_record(mut record: Record) -> Result<Self, CodecError> {
        match record.type_tag.as_str() {
            tags::FILTER_ALL => Ok(Filter::All),
            tags::FILTER_COMPARE => {
                let field_name = record.text("FieldName")?;
                let operator_name = record.text("Operator")?;
                let operator = CompareOp::from_name(&operator_name).ok_or_else(|| {
                    CodecError::invalid_record(
                        tags::FILTER_COMPARE,
                        format!("unknown operator '{}'", operator_name),
                    )
                })?;
                let item = record.take("Value");
                let value = item
                    .clone()
                    .into_value()
                    .ok_or_else(|| record.element_error("Value", &item))?;
                Ok(Filter::Compare {
                    field_name,
                    operator,
                    value,
                })
            }
            tags::FILTER_AND => Ok(Filter::And(operands(&mut record)?)),
            tags::FILTER_OR => Ok(Filter::Or(operands(&mut record)?)),
            tags::FILTER_NOT => Ok(Filter::Not(Box::new(Filter::from_record(
                record.record("Operand")?,
            )?))),
            other => Err(CodecError::invalid_record(other, "not a filter")),
        }
    }
}

fn operand_list(operands: &[Filter]) -> Item {
    Item::List(operands.iter().map(|f| Item::Record(f.to_record())).collect())
}

fn operands(record: &mut Record) -> Result<Vec<Filter>, CodecError> {
    record
        .list("Operands")?
        .into_iter()
        .map(|item| match item {
            Item::Record(r) => Filter::from_record(r),
            other => Err(record.element_error("Operands", &other)),
        })
        .collect()
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCriterion {
    pub field_name: String,
    pub descending: bool,
}

impl SortCriterion {
    /// Sorts by `field_name`, smallest first.
    pub fn ascending(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            descending: false,
        }
    }

    /// Sorts by `field_name`, largest first.
    pub fn descending(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            descending: true,
        }
    }

    pub fn to_record(&self) -> Record {
        Record::new(tags::SORT_CRITERION)
            .with("FieldName", self.field_name.as_str())
            .with("Descending", self.descending)
    }

    pub fn from_record(mut record: Record) -> Result<Self, CodecError> {
        if record.type_tag != tags::SORT_CRITERION {
            return Err(CodecError::invalid_record(&record.type_tag, "not a sort criterion"));
        }
        Ok(Self {
            field_name: record.text("FieldName")?,
            descending: record.opt_bool("Descending")?.unwrap_or(false),
        })
    }

    pub(crate) fn list_to_item(sort: &[SortCriterion]) -> Item {
        Item::List(sort.iter().map(|s| Item::Record(s.to_record())).collect())
    }

    pub(crate) fn list_from_record(record: &mut Record, name: &str) -> Result<Vec<Self>, CodecError> {
        record
            .list(name)?
            .into_iter()
            .map(|item| match item {
                Item::Record(r) => SortCriterion::from_record(r),
                other => Err(record.element_error(name, &other)),
            })
            .collect()
    }
}

/// Orders two objects by a list of sort criteria, given field accessors.
pub fn order_by(
    criteria: &[SortCriterion],
    a: &dyn Fn(&str) -> Option<Value>,
    b: &dyn Fn(&str) -> Option<Value>,
) -> Ordering {
    for criterion in criteria {
        let left = a(&criterion.field_name).unwrap_or(Value::Null);
        let right = b(&criterion.field_name).unwrap_or(Value::Null);
        let ordering = left.compare(&right).unwrap_or(Ordering::Equal);
        let ordering = if criterion.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fields(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_filter_evaluation() {
        let row = fields(&[("Name", Value::from("Ada Lovelace")), ("Age", Value::Int(36))]);
        let get = |name: &str| row.get(name).cloned();

        assert!(Filter::All.matches(&get));
        assert!(Filter::eq("Age", 36i64).matches(&get));
        assert!(Filter::compare("Age", CompareOp::Greater, 30.5).matches(&get));
        assert!(Filter::compare("Name", CompareOp::Contains, "love").matches(&get));
        assert!(!Filter::compare("Name", CompareOp::StartsWith, "Love").matches(&get));
        assert!(Filter::And(vec![Filter::All, Filter::eq("Age", 36i64)]).matches(&get));
        assert!(Filter::Or(vec![Filter::eq("Age", 1i64), Filter::All]).matches(&get));
        assert!(Filter::eq("Missing", Value::Null).matches(&get));
        assert!(!Filter::eq("Age", 36i64).negate().matches(&get));
    }

    #[test]
    fn test_filter_record_conversion() {
        let filter = Filter::And(vec![
            Filter::eq("Title", "x"),
            Filter::compare("Amount", CompareOp::LessOrEqual, 10i64).negate(),
        ]);
        let back = Filter::from_record(filter.to_record()).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let record = Record::new(tags::FILTER_COMPARE)
            .with("FieldName", "x")
            .with("Operator", "Like")
            .with("Value", 1i64);
        assert!(Filter::from_record(record).is_err());
    }

    #[test]
    fn test_order_by_multiple_keys() {
        let a = fields(&[("City", Value::from("Oslo")), ("Age", Value::Int(30))]);
        let b = fields(&[("City", Value::from("Oslo")), ("Age", Value::Int(40))]);
        let ga = |n: &str| a.get(n).cloned();
        let gb = |n: &str| b.get(n).cloned();

        let criteria = vec![SortCriterion::ascending("City"), SortCriterion::descending("Age")];
        assert_eq!(order_by(&criteria, &ga, &gb), Ordering::Greater);
        assert_eq!(order_by(&[], &ga, &gb), Ordering::Equal);
    }
}
