#![forbid(unsafe_code)]

//! The signer's identity: certificate, private key and the rest of the chain.

use crate::loader;
use crate::x509::CertificateInfo;
use rsa::RsaPrivateKey;
use sri_xades_core::Error;
use std::path::Path;

/// How the key and certificate are picked from a multi-bag container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BagSelection {
    /// First private key, paired with the certificate whose public key matches it.
    #[default]
    MatchingKey,
    /// First private key and first certificate, in container order.
    First,
    /// Exactly one private key and one certificate, otherwise an error.
    Strict,
}

/// A certificate and the RSA private key that signs for it.
///
/// Immutable once loaded; share it behind an `Arc` to sign from several threads.
#[derive(Clone)]
pub struct SigningIdentity {
    pub(crate) certificate: CertificateInfo,
    pub(crate) private_key: RsaPrivateKey,
    pub(crate) chain: Vec<Vec<u8>>,
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subject", &self.certificate.subject())
            .field("serial_number", &self.certificate.serial_number())
            .field("private_key", &"RSA private key")
            .field("chain", &self.chain.len())
            .finish()
    }
}

impl SigningIdentity {
    /// Load an identity from PKCS#12 bytes with the default [`BagSelection`].
    pub fn from_pkcs12(data: &[u8], password: &str) -> Result<Self, Error> {
        Self::from_pkcs12_with(data, password, BagSelection::default())
    }

    /// Load an identity from PKCS#12 bytes with an explicit bag selection rule.
    pub fn from_pkcs12_with(
        data: &[u8],
        password: &str,
        selection: BagSelection,
    ) -> Result<Self, Error> {
        loader::load_pkcs12(data, password, selection)
    }

    /// Read and load a PKCS#12 file.
    pub fn from_pkcs12_file(
        path: &Path,
        password: &str,
        selection: BagSelection,
    ) -> Result<Self, Error> {
        let data = std::fs::read(path).map_err(|e| {
            Error::IdentityLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_pkcs12_with(&data, password, selection)
    }

    /// Assemble an identity from already decoded parts.
    pub fn from_parts(certificate: CertificateInfo, private_key: RsaPrivateKey) -> Self {
        Self {
            certificate,
            private_key,
            chain: Vec::new(),
        }
    }

    pub fn certificate(&self) -> &CertificateInfo {
        &self.certificate
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Other certificates found in the container (DER), in container order.
    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }
}
