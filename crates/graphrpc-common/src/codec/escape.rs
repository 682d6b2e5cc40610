//! String escaping for the wire format.
//!
//! The splitter treats `{ } [ ] ,` as structure outside quoted spans and
//! honours a single escape character, so every structural character, the
//! quote, the backslash and the control characters 0x00-0x1F inside a
//! string are written with a leading backslash. Unescaping drops the
//! backslash and keeps the character that follows it.

/// The single escape character understood by the splitter.
pub const ESCAPE: char = '\\';

fn needs_escape(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | '"' | ESCAPE) || (c as u32) < 0x20
}

/// Prefixes structural characters, quotes, the escape character and
/// control characters with [`ESCAPE`].
///
/// # Example
///
/// ```
/// use graphrpc_common::codec::escape::{escape, unescape};
///
/// let text = "A [draft]";
/// assert_eq!(escape(text), r"A \[draft\]");
/// assert_eq!(unescape(&escape(text)), text);
/// ```
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if needs_escape(c) {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Drops every escape character and keeps the character after it. A
/// trailing lone escape is kept as is.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            // A trailing lone backslash is kept as-is.
            out.push(chars.next().unwrap_or(ESCAPE));
        } else {
            out.push(c);
        }
    }
    out
}

/// Escapes and wraps in double quotes.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", escape(text))
}
