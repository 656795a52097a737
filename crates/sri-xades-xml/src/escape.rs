#![forbid(unsafe_code)]

//! Character escaping shared by the document writer and the canonicalizer.
//!
//! The signed output and every digested fragment go through the same
//! functions, so what is hashed and what is written use one set of
//! entity references. The sets are the canonical XML ones, which are also
//! valid for plain serialization. Input that needs no escaping is returned
//! borrowed.

use std::borrow::Cow;

/// Where a piece of character data is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Text,
    Attribute,
    ProcessingInstruction,
}

fn reference(context: Context, ch: char) -> Option<&'static str> {
    match (context, ch) {
        (Context::ProcessingInstruction, '\r') => Some("&#xD;"),
        (Context::ProcessingInstruction, _) => None,
        (_, '&') => Some("&amp;"),
        (_, '<') => Some("&lt;"),
        (_, '\r') => Some("&#xD;"),
        (Context::Text, '>') => Some("&gt;"),
        (Context::Attribute, '"') => Some("&quot;"),
        (Context::Attribute, '\t') => Some("&#x9;"),
        (Context::Attribute, '\n') => Some("&#xA;"),
        _ => None,
    }
}

fn escape(s: &str, context: Context) -> Cow<'_, str> {
    let Some(first) = s.find(|ch| reference(context, ch).is_some()) else {
        return Cow::Borrowed(s);
    };
    let mut out = String::with_capacity(s.len() + 8);
    out.push_str(&s[..first]);
    for ch in s[first..].chars() {
        match reference(context, ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Escape element content (`&`, `<`, `>` and carriage return).
pub fn escape_text(s: &str) -> Cow<'_, str> {
    escape(s, Context::Text)
}

/// Escape a double-quoted attribute or namespace value (`&`, `<`, `"`, tab,
/// line feed and carriage return).
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    escape(s, Context::Attribute)
}

/// Escape processing instruction data; only carriage returns change.
pub fn escape_pi(s: &str) -> Cow<'_, str> {
    escape(s, Context::ProcessingInstruction)
}
