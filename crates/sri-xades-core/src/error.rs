#![forbid(unsafe_code)]

/// Errors produced while loading identities, signing, or validating documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The PKCS#12 container could not be decoded, decrypted, or lacks a usable bag.
    #[error("identity load error: {0}")]
    IdentityLoad(String),

    /// The input is not well-formed XML or has no single root element.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A sign operation could not be completed.
    #[error("signing error: {0}")]
    Signing(String),

    /// The signed text handed to the validator is not well-formed XML.
    #[error("validation parse error: {0}")]
    ValidationParse(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Re-label a primitive failure as a failed sign operation.
    ///
    /// Errors that already belong to the sign taxonomy pass through untouched.
    pub fn into_signing(self) -> Self {
        match self {
            Self::Signing(_) | Self::MalformedDocument(_) => self,
            other => Self::Signing(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
