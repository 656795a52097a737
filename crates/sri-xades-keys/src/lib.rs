#![forbid(unsafe_code)]

//! Signing identities for XAdES-BES.
//!
//! An identity is loaded once from a PKCS#12 container and is read-only
//! afterwards. The password is only borrowed while the container is decoded.

pub mod identity;
mod loader;
pub mod x509;

pub use identity::{BagSelection, SigningIdentity};
pub use x509::CertificateInfo;
