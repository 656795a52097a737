#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) container parsing for signing identities.
//!
//! Supports the legacy PBE (SHA-1 + 3DES-CBC) scheme still used by the
//! certificates national CAs issue, and PBES2 (PBKDF2 + AES-256-CBC) as
//! written by OpenSSL 3.x. Failures surface as [`Error::IdentityLoad`].

mod kdf;
mod parse;

use sri_xades_core::Error;

/// Contents extracted from a PKCS#12 file, in container order.
#[derive(Debug, Default)]
pub struct Pkcs12Contents {
    /// PKCS#8 DER-encoded private keys.
    pub private_keys: Vec<Vec<u8>>,
    /// DER-encoded X.509 certificates.
    pub certificates: Vec<Vec<u8>>,
}

/// Parse a PKCS#12 file, decrypting with the given password.
///
/// An empty password is accepted for unprotected containers. The password
/// is only borrowed for the duration of the call.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    parse::parse_pfx(data, password)
}
