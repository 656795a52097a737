#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0) over a document subtree.
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//!
//! The canonical form:
//! - Renders every in-scope namespace at the apex, then only changes below it
//! - Sorts namespace declarations by prefix (default first)
//! - Sorts attributes by (namespace-URI, local-name)
//! - Carries `xml:*` attributes inherited by the apex from its ancestors
//! - Writes empty elements as start/end pairs and drops comments

use crate::render::{Attr, NsDecl};
use sri_xades_core::{ns, Error};
use sri_xades_xml::{escape, NodeId, NodeKind, XmlTree};
use std::collections::BTreeMap;

/// Canonicalize the subtree rooted at `apex`.
pub fn canonicalize(tree: &XmlTree, apex: NodeId) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = C14nContext { tree, apex };
    ctx.process_node(apex, &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct C14nContext<'a> {
    tree: &'a XmlTree,
    apex: NodeId,
}

impl C14nContext<'_> {
    fn process_node(
        &self,
        id: NodeId,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match self.tree.kind(id) {
            NodeKind::Element(_) => self.process_element(id, output, rendered_ns)?,
            NodeKind::Text(text) => {
                output.extend_from_slice(escape::escape_text(text).as_bytes());
            }
            NodeKind::Comment(_) => {}
            NodeKind::ProcessingInstruction { target, data } => {
                output.extend_from_slice(b"<?");
                output.extend_from_slice(target.as_bytes());
                if let Some(data) = data.as_deref().filter(|d| !d.is_empty()) {
                    output.push(b' ');
                    output.extend_from_slice(escape::escape_pi(data).as_bytes());
                }
                output.extend_from_slice(b"?>");
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        id: NodeId,
        output: &mut Vec<u8>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let element = self
            .tree
            .element(id)
            .ok_or_else(|| Error::XmlStructure("expected an element".into()))?;
        let scope = self.tree.in_scope_namespaces(id);

        let mut ns_decls: Vec<NsDecl> = scope
            .iter()
            .filter(|(prefix, _)| prefix.as_str() != "xml")
            .filter(|(prefix, uri)| rendered_ns.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
            })
            .collect();

        // A default namespace rendered above but undeclared here.
        if rendered_ns.get("").is_some_and(|uri| !uri.is_empty()) && !scope.contains_key("") {
            ns_decls.push(NsDecl {
                prefix: String::new(),
                uri: String::new(),
            });
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = element
            .attributes
            .iter()
            .map(|(qname, value)| make_attr(&scope, qname, value))
            .collect();
        if id == self.apex {
            attrs.extend(self.inherited_xml_attrs(id, &attrs));
        }
        attrs.sort();

        output.push(b'<');
        output.extend_from_slice(element.name.as_bytes());
        for decl in &ns_decls {
            output.extend_from_slice(decl.render().as_bytes());
        }
        for attr in &attrs {
            output.extend_from_slice(attr.render().as_bytes());
        }
        output.push(b'>');

        let mut child_ns = rendered_ns.clone();
        for decl in ns_decls {
            child_ns.insert(decl.prefix, decl.uri);
        }
        for &child in self.tree.children(id) {
            self.process_node(child, output, &child_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(element.name.as_bytes());
        output.push(b'>');
        Ok(())
    }

    /// `xml:*` attributes declared on ancestors of `id` and not overridden
    /// on `id` itself; the nearest declaration wins.
    fn inherited_xml_attrs(&self, id: NodeId, existing: &[Attr]) -> Vec<Attr> {
        let mut inherited: BTreeMap<String, Attr> = BTreeMap::new();
        let mut current = self.tree.parent(id);
        while let Some(ancestor) = current {
            if let Some(element) = self.tree.element(ancestor) {
                for (qname, value) in &element.attributes {
                    if let Some(local) = qname.strip_prefix("xml:") {
                        let already = existing
                            .iter()
                            .any(|a| a.ns_uri == ns::XML && a.local_name == local);
                        if !already && !inherited.contains_key(local) {
                            inherited.insert(
                                local.to_owned(),
                                Attr {
                                    ns_uri: ns::XML.to_owned(),
                                    local_name: local.to_owned(),
                                    qualified_name: qname.clone(),
                                    value: value.clone(),
                                },
                            );
                        }
                    }
                }
            }
            current = self.tree.parent(ancestor);
        }
        inherited.into_values().collect()
    }
}

fn make_attr(scope: &BTreeMap<String, String>, qname: &str, value: &str) -> Attr {
    let (ns_uri, local_name) = match qname.split_once(':') {
        Some(("xml", local)) => (ns::XML.to_owned(), local),
        Some((prefix, local)) => (scope.get(prefix).cloned().unwrap_or_default(), local),
        None => (String::new(), qname),
    };
    Attr {
        ns_uri,
        local_name: local_name.to_owned(),
        qualified_name: qname.to_owned(),
        value: value.to_owned(),
    }
}
