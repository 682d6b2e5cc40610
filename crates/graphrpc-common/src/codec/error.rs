use thiserror::Error;

/// Longest excerpt of the offending text carried by an error.
const MAX_FRAGMENT_CHARS: usize = 120;

/// Failures raised while reading or writing the wire text.
///
/// Decode failures are always fatal to the current decode and are never
/// retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Malformed property: {0}")]
    MalformedProperty(String),

    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Malformed value: {0}")]
    MalformedValue(String),

    #[error("Arrays of arrays are not supported: {0}")]
    NestedArray(String),

    #[error("Expected a single object: {0}")]
    NotAnObject(String),

    #[error("Unbalanced structure: {0}")]
    Unbalanced(String),

    #[error("Object without Id: {0}")]
    MissingId(String),

    #[error("Object without Type: {0}")]
    MissingType(String),

    #[error("Unknown type tag '{0}'")]
    UnknownType(String),

    #[error("Cannot encode non-finite number {0}")]
    NonFiniteNumber(f64),

    #[error("Object {0} is not in the cache")]
    UnknownObject(uuid::Uuid),

    #[error("Invalid {tag} record: {reason}")]
    InvalidRecord { tag: String, reason: String },
}

impl CodecError {
    pub(crate) fn invalid_record(tag: &str, reason: impl Into<String>) -> Self {
        CodecError::InvalidRecord {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}

/// Shortens `text` for inclusion in an error message.
pub(crate) fn fragment(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_FRAGMENT_CHARS {
        return text.to_string();
    }
    let mut excerpt: String = text.chars().take(MAX_FRAGMENT_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}
