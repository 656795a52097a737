#![forbid(unsafe_code)]

//! Digest (hash) algorithm implementations.

use digest::Digest;
use sri_xades_core::{algorithm, Error};
use std::fmt;
use std::str::FromStr;

/// Hash family selected for a signature.
///
/// One value drives every digest slot and the signature method, so
/// switching to SHA-256 touches no call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-1, the tax authority's default.
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// `DigestMethod` URI.
    pub fn digest_uri(self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha256 => algorithm::SHA256,
        }
    }

    /// `SignatureMethod` URI (RSA PKCS#1 v1.5 with this hash).
    pub fn signature_uri(self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::RSA_SHA1,
            Self::Sha256 => algorithm::RSA_SHA256,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => f.write_str("SHA-1"),
            Self::Sha256 => f.write_str("SHA-256"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    /// Accepts `SHA-1`, `sha1`, `SHA-256`, `sha256` and the digest URIs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            _ => match s {
                algorithm::SHA1 => Ok(Self::Sha1),
                algorithm::SHA256 => Ok(Self::Sha256),
                _ => Err(Error::UnsupportedAlgorithm(format!("hash algorithm: {s}"))),
            },
        }
    }
}

/// Trait for digest algorithms.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// Algorithm URI.
    fn uri(&self) -> &'static str;
}

/// Create a digest algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn DigestAlgorithm>, Error> {
    match uri {
        algorithm::SHA1 => Ok(Box::new(Sha1Digest::new())),
        algorithm::SHA256 => Ok(Box::new(Sha256Digest::new())),
        _ => Err(Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}"))),
    }
}

/// Compute a digest in one shot.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut hasher = from_uri(uri)?;
    hasher.update(data);
    Ok(hasher.finalize())
}

/// Compute a digest and return it base64-encoded, ready for a `DigestValue`.
pub fn digest_base64(uri: &str, data: &[u8]) -> Result<String, Error> {
    digest(uri, data).map(|d| crate::encode_base64(&d))
}

// ── Concrete implementations ─────────────────────────────────────────

macro_rules! impl_digest {
    ($name:ident, $hasher:ty, $uri:expr) => {
        struct $name {
            inner: $hasher,
        }

        impl $name {
            fn new() -> Self {
                Self {
                    inner: <$hasher>::new(),
                }
            }
        }

        impl DigestAlgorithm for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                Digest::finalize(self.inner).to_vec()
            }

            fn uri(&self) -> &'static str {
                $uri
            }
        }
    };
}

impl_digest!(Sha1Digest, sha1::Sha1, algorithm::SHA1);
impl_digest!(Sha256Digest, sha2::Sha256, algorithm::SHA256);

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_sha256() {
        let result = digest(algorithm::SHA256, b"hello").unwrap();
        assert_eq!(
            hex(&result),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha1() {
        let result = digest(algorithm::SHA1, b"hello").unwrap();
        assert_eq!(hex(&result), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn test_digest_base64_of_empty_input() {
        // SHA-1 of the empty string.
        assert_eq!(
            digest_base64(algorithm::SHA1, b"").unwrap(),
            "2jmj7l5rSw0yVb/vlWAYkK/YBwk="
        );
    }

    #[test]
    fn test_unknown_uri_is_rejected() {
        let err = digest("urn:nope", b"x").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_hash_algorithm_parsing_and_uris() {
        assert_eq!("SHA-1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!(
            algorithm::SHA256.parse::<HashAlgorithm>().unwrap(),
            HashAlgorithm::Sha256
        );
        assert!("md5".parse::<HashAlgorithm>().is_err());
        assert_eq!(HashAlgorithm::default().digest_uri(), algorithm::SHA1);
        assert_eq!(HashAlgorithm::Sha256.signature_uri(), algorithm::RSA_SHA256);
        assert_eq!(from_uri(algorithm::SHA256).unwrap().uri(), algorithm::SHA256);
    }
}
