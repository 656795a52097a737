#![forbid(unsafe_code)]

//! Digest and signature primitives for XAdES-BES signing.
//!
//! Both are deterministic pure functions of their inputs and are addressed
//! by algorithm URI, so call sites never hard-code a hash.

pub mod digest;
pub mod sign;

pub use digest::{DigestAlgorithm, HashAlgorithm};
pub use sign::SignatureAlgorithm;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Base64 (standard alphabet, padded) as used in every XML-DSig text slot.
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard base64, ignoring embedded whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, sri_xades_core::Error> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| sri_xades_core::Error::Crypto(format!("invalid base64: {e}")))
}
