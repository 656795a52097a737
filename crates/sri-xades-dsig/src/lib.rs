#![forbid(unsafe_code)]

//! XAdES-BES enveloped signatures for SRI (Ecuador) electronic documents.
//!
//! [`sign_document`] parses a document, appends a `ds:Signature` built in
//! two phases (see [`skeleton`] and [`sign`]) and returns the signed text.
//! [`SigningContext`] keeps a loaded identity for repeated use.

pub mod context;
pub mod options;
pub mod sign;
pub mod skeleton;

pub use context::SigningContext;
pub use options::{format_signing_time, ProductionPlace, SignOptions, SignerRole};
pub use sign::{build_signature, sign_document};
pub use skeleton::Skeleton;
