#![forbid(unsafe_code)]

//! XAdES-BES signing and structural validation for SRI (Ecuador)
//! electronic invoices.
//!
//! ```no_run
//! use sri_xades::{SignOptions, SigningContext, BagSelection};
//!
//! let mut ctx = SigningContext::new();
//! ctx.load_identity(&std::fs::read("firma.p12")?, "password", BagSelection::default())?;
//! let signed = ctx.sign(&std::fs::read_to_string("factura.xml")?, &SignOptions::default())?;
//! assert!(sri_xades::validate(&signed).is_valid());
//! # Ok::<(), sri_xades::Error>(())
//! ```

pub use sri_xades_c14n as c14n;
pub use sri_xades_core as core;
pub use sri_xades_crypto as crypto;
pub use sri_xades_dsig as dsig;
pub use sri_xades_keys as keys;
pub use sri_xades_pkcs12 as pkcs12;
pub use sri_xades_validate as validation;
pub use sri_xades_xml as xml;

pub use sri_xades_c14n::C14nMode;
pub use sri_xades_core::{Error, Result};
pub use sri_xades_crypto::HashAlgorithm;
pub use sri_xades_dsig::{sign_document, ProductionPlace, SignOptions, SignerRole, SigningContext};
pub use sri_xades_keys::{BagSelection, CertificateInfo, SigningIdentity};
pub use sri_xades_validate::{validate, ValidationReport};

use log::debug;
use std::path::Path;

/// Read a signed document and check its structure.
pub fn validate_file(path: &Path) -> Result<ValidationReport> {
    debug!("validating {}", path.display());
    let xml = std::fs::read_to_string(path)?;
    Ok(validate(&xml))
}
