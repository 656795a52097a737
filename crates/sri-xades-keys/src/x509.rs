#![forbid(unsafe_code)]

//! Facts extracted from the signer's X.509 certificate.
//!
//! Only what the signature needs is decoded: names, serial, validity window
//! and the RSA public key. No chain or trust validation happens here.

use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sri_xades_core::Error;
use sri_xades_crypto::HashAlgorithm;
use x509_cert::name::Name;
use x509_cert::Certificate;

/// OID of the `commonName` attribute (2.5.4.3), DER content bytes.
const CN_OID: &[u8] = &[0x55, 0x04, 0x03];

/// A decoded signer certificate.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    der: Vec<u8>,
    issuer: String,
    subject: String,
    issuer_cn: Option<String>,
    subject_cn: Option<String>,
    serial_number: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: RsaPublicKey,
}

impl CertificateInfo {
    /// Decode a DER certificate carrying an RSA public key.
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let cert = Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let spki_der = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| Error::Certificate(format!("certificate key is not RSA: {e}")))?;

        let serial_number =
            rsa::BigUint::from_bytes_be(tbs.serial_number.as_bytes()).to_string();

        Ok(Self {
            der: der.to_vec(),
            issuer: tbs.issuer.to_string(),
            subject: tbs.subject.to_string(),
            issuer_cn: common_name(&tbs.issuer),
            subject_cn: common_name(&tbs.subject),
            serial_number,
            not_before: to_datetime(&tbs.validity.not_before)?,
            not_after: to_datetime(&tbs.validity.not_after)?,
            public_key,
        })
    }

    /// The certificate exactly as stored in the container.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Issuer distinguished name in RFC 4514 form.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Subject distinguished name in RFC 4514 form.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer_cn(&self) -> Option<&str> {
        self.issuer_cn.as_deref()
    }

    pub fn subject_cn(&self) -> Option<&str> {
        self.subject_cn.as_deref()
    }

    /// Serial number as an unsigned decimal integer.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Big-endian RSA modulus.
    pub fn modulus(&self) -> Vec<u8> {
        self.public_key.n().to_bytes_be()
    }

    /// Big-endian RSA public exponent.
    pub fn exponent(&self) -> Vec<u8> {
        self.public_key.e().to_bytes_be()
    }

    /// Digest of the DER encoding.
    pub fn digest(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>, Error> {
        sri_xades_crypto::digest::digest(algorithm.digest_uri(), &self.der)
    }

    /// Whether `time` falls inside the validity window (bounds inclusive).
    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.not_before <= time && time <= self.not_after
    }
}

fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid.as_bytes() == CN_OID)
        .and_then(|atv| std::str::from_utf8(atv.value.value()).ok())
        .map(str::to_owned)
}

fn to_datetime(time: &x509_cert::time::Time) -> Result<DateTime<Utc>, Error> {
    let since_epoch = time.to_unix_duration();
    let secs = i64::try_from(since_epoch.as_secs())
        .map_err(|_| Error::Certificate("validity time out of range".into()))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| Error::Certificate("validity time out of range".into()))
}
