//! Element values carried by persistent object fields.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Ticks between 0001-01-01T00:00:00 and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Number of ticks per second (one tick is 100 nanoseconds).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// A point in time expressed as 100-nanosecond ticks since 0001-01-01.
///
/// This is the only date/time representation on the wire: encoders emit the
/// tick count as an unquoted integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ticks(pub i64);

impl Ticks {
    /// Converts a system time into ticks.
    pub fn from_system_time(time: SystemTime) -> Self {
        let ticks = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => UNIX_EPOCH_TICKS + (after.as_nanos() / 100) as i64,
            Err(before) => UNIX_EPOCH_TICKS - (before.duration().as_nanos() / 100) as i64,
        };
        Ticks(ticks)
    }

    /// The current time in ticks.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Converts back into a system time, if representable.
    pub fn to_system_time(self) -> Option<SystemTime> {
        let relative = self.0.checked_sub(UNIX_EPOCH_TICKS)?;
        let offset = Duration::from_nanos(relative.unsigned_abs().checked_mul(100)?);
        if relative >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        }
    }
}

/// An opaque reference to a user of the directory.
///
/// Only the id crosses the wire; the display name is filled in by the
/// receiving side's directory lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UserRef {
    pub id: Uuid,
    pub display_name: Option<String>,
}

impl UserRef {
    pub fn new(id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: Some(display_name.into()),
        }
    }

    /// The well-known reference used for the zero id.
    pub fn anonymous() -> Self {
        Self::new(Uuid::nil(), "Anonymous")
    }

    /// A reference whose id the directory could not resolve.
    pub fn unresolved(id: Uuid) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_nil()
    }
}

/// Declared content kind of an element field.
///
/// The decoder uses it to interpret quoted strings and numbers; undeclared
/// fields are inferred from the wire shape instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Text,
    Bool,
    Integer,
    Decimal,
    DateTime,
    User,
    Guid,
    /// Left as a raw string for the field itself to parse.
    Generic,
}

/// A single element value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
    DateTime(Ticks),
    User(UserRef),
    Guid(Uuid),
    Raw(String),
}

impl Value {
    /// Numeric view used by aggregates and comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Decimal(d) => Some(*d),
            Value::DateTime(t) => Some(t.0 as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Raw(s) => Some(s),
            _ => None,
        }
    }

    /// Loose ordering across kinds: numbers compare numerically, ids and
    /// strings compare by their text form, null sorts first.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => {
                if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                    return a.partial_cmp(&b);
                }
                Some(self.to_string().cmp(&other.to_string()))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) | Value::Raw(s) => write!(f, "{}", s),
            Value::DateTime(t) => write!(f, "{}", t.0),
            Value::User(u) => write!(f, "{}", u.id),
            Value::Guid(g) => write!(f, "{}", g),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Decimal(d)
    }
}

impl From<Ticks> for Value {
    fn from(t: Ticks) -> Self {
        Value::DateTime(t)
    }
}

impl From<UserRef> for Value {
    fn from(u: UserRef) -> Self {
        Value::User(u)
    }
}

impl From<Uuid> for Value {
    fn from(g: Uuid) -> Self {
        Value::Guid(g)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_unix_epoch() {
        assert_eq!(Ticks::from_system_time(UNIX_EPOCH), Ticks(UNIX_EPOCH_TICKS));
        assert_eq!(Ticks(UNIX_EPOCH_TICKS).to_system_time(), Some(UNIX_EPOCH));
    }

    #[test]
    fn test_ticks_roundtrip_after_epoch() {
        let time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let ticks = Ticks::from_system_time(time);
        assert_eq!(ticks.0, UNIX_EPOCH_TICKS + 1_700_000_000 * TICKS_PER_SECOND);
        assert_eq!(ticks.to_system_time(), Some(time));
    }

    #[test]
    fn test_anonymous_user() {
        let anon = UserRef::anonymous();
        assert!(anon.is_anonymous());
        assert_eq!(anon.display_name.as_deref(), Some("Anonymous"));
    }

    #[test]
    fn test_compare_numbers_across_kinds() {
        assert_eq!(Value::Int(2).compare(&Value::Decimal(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Null.compare(&Value::Int(0)), Some(Ordering::Less));
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
    }
}
