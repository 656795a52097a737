#![forbid(unsafe_code)]

//! Arena-backed XML tree with stable node handles.

use sri_xades_core::{ns, Error};
use std::collections::BTreeMap;

/// Stable handle to a node of an [`XmlTree`].
///
/// Handles stay valid for the lifetime of the tree: nodes are never removed
/// from the arena, only detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An element as written in the source: qualified names, declarations and
/// attributes in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name (`prefix:local` or `local`).
    pub name: String,
    /// Namespace declarations made on this element, as `(prefix, uri)`;
    /// the default namespace uses the empty prefix.
    pub namespaces: Vec<(String, String)>,
    /// Attributes as `(qualified name, value)`.
    pub attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: Option<String> },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A single-rooted XML document held in an arena.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl XmlTree {
    /// Create a tree holding only an empty root element.
    pub fn new(root_name: &str) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.alloc(NodeKind::Element(Element::new(root_name)), None);
        tree
    }

    /// Parse XML text into a tree.
    ///
    /// Fails with [`Error::MalformedDocument`] when the text is not
    /// well-formed or does not have exactly one root element. Nodes outside
    /// the root (prolog comments, the declaration) are not kept.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| Error::MalformedDocument(e.to_string()))?;

        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.import(doc.root_element(), None, text);
        Ok(tree)
    }

    fn import(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        parent: Option<NodeId>,
        source: &str,
    ) -> NodeId {
        let kind = match node.node_type() {
            roxmltree::NodeType::Element => NodeKind::Element(Element {
                name: source_qualified_name(node, source),
                namespaces: declared_namespaces(node),
                attributes: node
                    .attributes()
                    .map(|a| (attribute_qualified_name(node, &a), a.value().to_owned()))
                    .collect(),
            }),
            roxmltree::NodeType::Text => NodeKind::Text(node.text().unwrap_or("").to_owned()),
            roxmltree::NodeType::Comment => {
                NodeKind::Comment(node.text().unwrap_or("").to_owned())
            }
            roxmltree::NodeType::PI => {
                let (target, data) = node
                    .pi()
                    .map(|pi| (pi.target.to_owned(), pi.value.map(str::to_owned)))
                    .unwrap_or_default();
                NodeKind::ProcessingInstruction { target, data }
            }
            // The document node never appears below the root element.
            roxmltree::NodeType::Root => NodeKind::Text(String::new()),
        };

        let id = self.alloc(kind, parent);
        if node.is_element() {
            for child in node.children() {
                let child_id = self.import(child, Some(id), source);
                self.nodes[id.0].children.push(child_id);
            }
        }
        id
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// The document (root) element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element(_) => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    /// `id` and all its descendants in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev());
        }
        out
    }

    /// First element at or below `from` whose local name is `local_name`.
    pub fn find_element(&self, from: NodeId, local_name: &str) -> Option<NodeId> {
        self.descendants(from).into_iter().find(|&id| {
            self.element(id)
                .is_some_and(|e| e.local_name() == local_name)
        })
    }

    /// Namespace bindings in scope at `id`, declarations closest to it winning.
    ///
    /// An undeclared default namespace (`xmlns=""`) removes the binding.
    pub fn in_scope_namespaces(&self, id: NodeId) -> BTreeMap<String, String> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.nodes[node.0].parent;
        }

        let mut scope = BTreeMap::new();
        for node in chain.into_iter().rev() {
            if let Some(element) = self.element(node) {
                for (prefix, uri) in &element.namespaces {
                    if prefix.is_empty() && uri.is_empty() {
                        scope.remove("");
                    } else {
                        scope.insert(prefix.clone(), uri.clone());
                    }
                }
            }
        }
        scope
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Allocate a detached element. Attach it with [`append_child`](Self::append_child).
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeKind::Element(Element::new(name)), None)
    }

    /// Allocate an element as the last child of `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.alloc(NodeKind::Element(Element::new(name)), Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Allocate a text node as the last child of `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeKind::Text(text.to_owned()), Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach a detached subtree as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        if self.element(parent).is_none() {
            return Err(Error::XmlStructure("parent is not an element".into()));
        }
        if self.nodes[child.0].parent.is_some() || child == self.root {
            return Err(Error::XmlStructure("node is already attached".into()));
        }
        // Refuse to create a cycle.
        let mut ancestor = Some(parent);
        while let Some(a) = ancestor {
            if a == child {
                return Err(Error::XmlStructure(
                    "cannot attach a node below itself".into(),
                ));
            }
            ancestor = self.nodes[a.0].parent;
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Replace the content of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        self.append_text(id, text);
    }

    /// Set (or replace) an attribute, keeping first-insertion order.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(element) = &mut self.nodes[id.0].kind {
            match element.attributes.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.to_owned(),
                None => element.attributes.push((name.to_owned(), value.to_owned())),
            }
        }
    }

    /// Declare a namespace binding on `id` (empty prefix for the default namespace).
    pub fn declare_namespace(&mut self, id: NodeId, prefix: &str, uri: &str) {
        if let NodeKind::Element(element) = &mut self.nodes[id.0].kind {
            match element.namespaces.iter_mut().find(|(p, _)| p == prefix) {
                Some(slot) => slot.1 = uri.to_owned(),
                None => element.namespaces.push((prefix.to_owned(), uri.to_owned())),
            }
        }
    }
}

// ── roxmltree import helpers ─────────────────────────────────────────

/// Element name exactly as written in the start tag.
fn source_qualified_name(node: roxmltree::Node<'_, '_>, source: &str) -> String {
    let start = node.range().start + 1;
    let written = source
        .get(start..)
        .and_then(|rest| {
            rest.split(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .next()
        })
        .unwrap_or("");
    if written.is_empty() {
        node.tag_name().name().to_owned()
    } else {
        written.to_owned()
    }
}

fn attribute_qualified_name(node: roxmltree::Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> String {
    match attr.namespace() {
        Some(ns::XML) => format!("xml:{}", attr.name()),
        Some(uri) => {
            // Namespaced attributes always carry a prefix; skip a default
            // namespace that happens to share the URI.
            match node
                .namespaces()
                .filter(|n| n.uri() == uri)
                .find_map(|n| n.name())
            {
                Some(prefix) => format!("{prefix}:{}", attr.name()),
                None => attr.name().to_owned(),
            }
        }
        None => attr.name().to_owned(),
    }
}

/// Bindings that are in scope at `node` but not at its parent element.
///
/// A default namespace dropped with `xmlns=""` is recorded as `("", "")`.
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<(String, String)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|n| (n.name(), n.uri())).collect())
        .unwrap_or_default();
    let own: Vec<(Option<&str>, &str)> = node
        .namespaces()
        .filter(|n| n.name() != Some("xml"))
        .map(|n| (n.name(), n.uri()))
        .collect();

    let mut declared: Vec<(String, String)> = own
        .iter()
        .filter(|(_, uri)| !uri.is_empty())
        .filter(|binding| !inherited.contains(binding))
        .map(|(prefix, uri)| (prefix.unwrap_or("").to_owned(), (*uri).to_owned()))
        .collect();

    let has_default = |bindings: &[(Option<&str>, &str)]| {
        bindings.iter().any(|(prefix, uri)| prefix.is_none() && !uri.is_empty())
    };
    if has_default(&inherited) && !has_default(&own) {
        declared.insert(0, (String::new(), String::new()));
    }
    declared
}
