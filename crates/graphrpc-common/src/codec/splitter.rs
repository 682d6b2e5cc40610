//! Structural splitter for the wire text.
//!
//! This is a bespoke subset parser, not a JSON parser: `{ } [ ] ,` and `:`
//! are structure only outside quoted spans, and a backslash always makes the
//! next character literal. Everything here works on borrowed slices of the
//! input.

use super::error::{fragment, CodecError};
use super::escape::ESCAPE;

/// Syntactic shape of one value token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Null,
    Bool(bool),
    /// Contents between the quotes, still escaped.
    Quoted(&'a str),
    /// Unquoted number text.
    Number(&'a str),
    /// Contents between the brackets.
    Array(&'a str),
    /// The whole `{...}` token.
    Object(&'a str),
}

/// Walks `text`, calling `visit` for every character at nesting depth zero
/// outside quotes. Returning `true` from `visit` stops the walk early.
fn walk(text: &str, mut visit: impl FnMut(usize, char) -> bool) -> Result<(), CodecError> {
    let mut closers: Vec<char> = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            ESCAPE => escaped = true,
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(c) {
                    return Err(CodecError::Unbalanced(fragment(text)));
                }
            }
            _ if closers.is_empty() => {
                if visit(i, c) {
                    return Ok(());
                }
            }
            _ => {}
        }
    }

    if in_quotes || !closers.is_empty() {
        return Err(CodecError::Unbalanced(fragment(text)));
    }
    Ok(())
}

/// Splits `text` on `separator` occurrences at the top level. Parts are
/// trimmed; an all-whitespace input yields no parts.
pub fn split_top_level(text: &str, separator: char) -> Result<Vec<&str>, CodecError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut start = 0;
    walk(text, |i, c| {
        if c == separator {
            parts.push(text[start..i].trim());
            start = i + c.len_utf8();
        }
        false
    })?;
    parts.push(text[start..].trim());
    Ok(parts)
}

/// Splits a `"key":value` property on its first top-level colon.
pub fn split_property(text: &str) -> Result<(&str, &str), CodecError> {
    let mut colon = None;
    walk(text, |i, c| {
        if c == ':' {
            colon = Some(i);
            return true;
        }
        false
    })?;
    match colon {
        Some(i) => Ok((text[..i].trim(), text[i + 1..].trim())),
        None => Err(CodecError::MalformedProperty(fragment(text))),
    }
}

/// Returns the inner text if `text` is exactly one `open ... close` token.
pub fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let text = text.trim();
    if !text.starts_with(open) || !text.ends_with(close) || text.len() < 2 {
        return None;
    }

    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            ESCAPE => escaped = true,
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    // The first opener must close at the very end.
                    return (i == text.len() - 1).then(|| &text[1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Returns the still-escaped contents if `text` is exactly one quoted span.
pub fn quoted(text: &str) -> Option<&str> {
    let text = text.trim();
    let rest = text.strip_prefix('"')?;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            ESCAPE => escaped = true,
            '"' => return (i == rest.len() - 1).then(|| &rest[..i]),
            _ => {}
        }
    }
    None
}

fn is_number(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        && text.parse::<f64>().is_ok()
}

/// Classifies one value token by its syntactic shape.
pub fn classify(text: &str) -> Result<Token<'_>, CodecError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("null") {
        return Ok(Token::Null);
    }
    if text.eq_ignore_ascii_case("true") {
        return Ok(Token::Bool(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Ok(Token::Bool(false));
    }
    if let Some(inner) = quoted(text) {
        return Ok(Token::Quoted(inner));
    }
    if let Some(inner) = delimited(text, '[', ']') {
        return Ok(Token::Array(inner));
    }
    if delimited(text, '{', '}').is_some() {
        return Ok(Token::Object(text));
    }
    if is_number(text) {
        return Ok(Token::Number(text));
    }
    Err(CodecError::MalformedValue(fragment(text)))
}
