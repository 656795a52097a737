#![forbid(unsafe_code)]

//! RSA PKCS#1 v1.5 signature algorithms.

use rsa::{RsaPrivateKey, RsaPublicKey};
use signature::SignatureEncoding;
use sri_xades_core::{algorithm, Error};

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &RsaPublicKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA1,
            hash: HashType::Sha1,
        })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA256,
            hash: HashType::Sha256,
        })),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "signature algorithm: {uri}"
        ))),
    }
}

/// Sign `data` and return the signature base64-encoded, ready for `SignatureValue`.
pub fn sign_base64(uri: &str, key: &RsaPrivateKey, data: &[u8]) -> Result<String, Error> {
    let signature = from_uri(uri)?.sign(key, data)?;
    Ok(crate::encode_base64(&signature))
}

#[derive(Debug, Clone, Copy)]
enum HashType {
    Sha1,
    Sha256,
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 {
    uri: &'static str,
    hash: HashType,
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(key.clone());
                sk.try_sign(data)
                    .map(|sig| sig.to_vec())
                    .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
        }
    }

    fn verify(&self, key: &RsaPublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
        }
    }
}
