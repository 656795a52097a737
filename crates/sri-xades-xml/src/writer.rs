#![forbid(unsafe_code)]

//! Serialization of [`XmlTree`] nodes back to text.
//!
//! Elements are always written as explicit start/end pairs, attributes and
//! namespace declarations in stored order, and no whitespace is inserted.

use crate::escape;
use crate::tree::{NodeId, NodeKind, XmlTree};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// Declaration written at the head of every serialized document.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

lazy_static! {
    /// Markup token scanner. Comments, CDATA sections and processing
    /// instructions match as opaque spans (no capture groups) so that tag-like
    /// text inside them is never treated as a tag. A self-closing tag fills
    /// group 1 (name) and group 2 (attributes).
    static ref MARKUP: Regex = Regex::new(
        r#"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>|<\?.*?\?>|<([\p{L}_][\w.:\-]*)((?:\s+[^\s=/>]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*/>"#
    )
    .expect("markup pattern is valid");
}

/// Serialize `id` and its subtree.
pub fn serialize_node(tree: &XmlTree, id: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out);
    out
}

/// Serialize the whole document: declaration, a newline, then the root element.
pub fn serialize_document(tree: &XmlTree) -> String {
    let mut out = String::from(XML_DECLARATION);
    out.push('\n');
    write_node(tree, tree.root(), &mut out);
    out
}

fn write_node(tree: &XmlTree, id: NodeId, out: &mut String) {
    match tree.kind(id) {
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for (prefix, uri) in &element.namespaces {
                if prefix.is_empty() {
                    out.push_str(" xmlns=\"");
                } else {
                    out.push_str(" xmlns:");
                    out.push_str(prefix);
                    out.push_str("=\"");
                }
                out.push_str(&escape::escape_attr(uri));
                out.push('"');
            }
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape::escape_attr(value));
                out.push('"');
            }
            out.push('>');
            for &child in tree.children(id) {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
        NodeKind::Text(text) => out.push_str(&escape::escape_text(text)),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(data) = data {
                out.push(' ');
                out.push_str(&escape::escape_pi(data));
            }
            out.push_str("?>");
        }
    }
}

/// Rewrite every self-closing tag `<x a="1"/>` as `<x a="1"></x>`.
///
/// Comments, CDATA sections and processing instructions are copied verbatim.
/// Text without self-closing tags is returned unchanged (and unallocated).
pub fn expand_self_closing(xml: &str) -> Cow<'_, str> {
    if !has_self_closing(xml) {
        return Cow::Borrowed(xml);
    }
    MARKUP.replace_all(xml, |caps: &Captures<'_>| match (caps.get(1), caps.get(2)) {
        (Some(name), Some(attrs)) => {
            format!("<{0}{1}></{0}>", name.as_str(), attrs.as_str())
        }
        _ => caps[0].to_string(),
    })
}

/// Whether `xml` contains at least one self-closing tag outside comments,
/// CDATA sections and processing instructions.
pub fn has_self_closing(xml: &str) -> bool {
    MARKUP
        .captures_iter(xml)
        .any(|caps| caps.get(1).is_some())
}
