#![forbid(unsafe_code)]

//! XML namespace constants used across the library.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XAdES 1.3.2 namespace
pub const XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix bound to [`DSIG`] in produced signatures.
pub const DSIG_PREFIX: &str = "ds";

/// Prefix bound to [`XADES`] in produced signatures.
pub const XADES_PREFIX: &str = "etsi";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const OBJECT: &str = "Object";

    // KeyInfo elements
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_VALUE: &str = "KeyValue";
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
    pub const X509_ISSUER_NAME: &str = "X509IssuerName";
    pub const X509_SERIAL_NUMBER: &str = "X509SerialNumber";

    // XAdES elements
    pub const QUALIFYING_PROPERTIES: &str = "QualifyingProperties";
    pub const SIGNED_PROPERTIES: &str = "SignedProperties";
    pub const SIGNED_SIGNATURE_PROPERTIES: &str = "SignedSignatureProperties";
    pub const SIGNING_TIME: &str = "SigningTime";
    pub const SIGNING_CERTIFICATE: &str = "SigningCertificate";
    pub const CERT: &str = "Cert";
    pub const CERT_DIGEST: &str = "CertDigest";
    pub const ISSUER_SERIAL: &str = "IssuerSerial";
    pub const SIGNATURE_PRODUCTION_PLACE: &str = "SignatureProductionPlace";
    pub const CITY: &str = "City";
    pub const STATE_OR_PROVINCE: &str = "StateOrProvince";
    pub const POSTAL_CODE: &str = "PostalCode";
    pub const COUNTRY_NAME: &str = "CountryName";
    pub const SIGNER_ROLE: &str = "SignerRole";
    pub const CLAIMED_ROLES: &str = "ClaimedRoles";
    pub const CLAIMED_ROLE: &str = "ClaimedRole";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const TYPE: &str = "Type";
    pub const ALGORITHM: &str = "Algorithm";
    pub const TARGET: &str = "Target";
}

// ── Fixed identifiers ────────────────────────────────────────────────

/// `Id` values carried by the produced signature. Consumers address these
/// by name, so they never vary between documents.
pub mod id {
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const OBJECT: &str = "Object";
    pub const SIGNED_PROPERTIES: &str = "SignedProperties";

    /// Reference to the signed document root.
    pub const DOCUMENT_REFERENCE: &str = "#comprobante";
}
