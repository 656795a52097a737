#![forbid(unsafe_code)]

//! XML document model for signing.
//!
//! The input document is imported from `roxmltree` into an arena
//! ([`XmlTree`]) whose nodes are addressed by stable [`NodeId`] handles.
//! The signature builder allocates placeholder nodes, keeps their handles,
//! and fills them in later passes without walking the tree again.

pub mod escape;
pub mod tree;
pub mod writer;

pub use tree::{Element, NodeId, NodeKind, XmlTree};
