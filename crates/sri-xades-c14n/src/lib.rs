#![forbid(unsafe_code)]

//! Canonicalization of signature fragments.
//!
//! Fragments are canonicalized in place inside the [`XmlTree`] they belong
//! to, so namespace bindings inherited from ancestors are visible to the
//! output without re-parsing anything.

pub mod inclusive;
pub mod render;

use sri_xades_core::{algorithm, Error};
use sri_xades_xml::{writer, NodeId, XmlTree};

/// How a fragment is turned into bytes for digesting or signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum C14nMode {
    /// Canonical XML 1.0 without comments.
    #[default]
    Inclusive,
    /// The node serialized as stored, without namespace propagation.
    Direct,
}

impl C14nMode {
    /// Algorithm URI declared in `CanonicalizationMethod`.
    ///
    /// Both modes declare Canonical XML 1.0; `Direct` only differs in how
    /// the bytes are produced locally.
    pub fn uri(&self) -> &'static str {
        algorithm::C14N
    }
}

impl std::fmt::Display for C14nMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inclusive => write!(f, "inclusive"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for C14nMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "inclusive" | "c14n" | algorithm::C14N => Ok(Self::Inclusive),
            "direct" | "none" => Ok(Self::Direct),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "canonicalization: {other}"
            ))),
        }
    }
}

/// Canonicalize the subtree rooted at `node`.
pub fn canonicalize(tree: &XmlTree, node: NodeId, mode: C14nMode) -> Result<Vec<u8>, Error> {
    if tree.element(node).is_none() {
        return Err(Error::XmlStructure(
            "canonicalization apex is not an element".into(),
        ));
    }
    match mode {
        C14nMode::Inclusive => inclusive::canonicalize(tree, node),
        C14nMode::Direct => Ok(writer::serialize_node(tree, node).into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("inclusive".parse::<C14nMode>().unwrap(), C14nMode::Inclusive);
        assert_eq!(algorithm::C14N.parse::<C14nMode>().unwrap(), C14nMode::Inclusive);
        assert_eq!("direct".parse::<C14nMode>().unwrap(), C14nMode::Direct);
        assert!(matches!(
            "exclusive".parse::<C14nMode>(),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert_eq!(C14nMode::default().uri(), algorithm::C14N);
    }

    #[test]
    fn test_direct_serializes_as_stored() {
        let tree = XmlTree::parse(r#"<a xmlns:p="urn:p"><p:b z="1" a="2"/></a>"#).unwrap();
        let b = tree.children(tree.root())[0];
        let direct = canonicalize(&tree, b, C14nMode::Direct).unwrap();
        assert_eq!(direct, br#"<p:b z="1" a="2"></p:b>"#);
        let inclusive = canonicalize(&tree, b, C14nMode::Inclusive).unwrap();
        assert_eq!(inclusive, br#"<p:b xmlns:p="urn:p" a="2" z="1"></p:b>"#);
    }

    #[test]
    fn test_rejects_text_apex() {
        let tree = XmlTree::parse("<a>text</a>").unwrap();
        let text = tree.children(tree.root())[0];
        assert!(canonicalize(&tree, text, C14nMode::Inclusive).is_err());
    }
}
