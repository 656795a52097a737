#![forbid(unsafe_code)]

//! Identity loading from PKCS#12 containers.

use crate::identity::{BagSelection, SigningIdentity};
use crate::x509::CertificateInfo;
use log::{info, warn};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use sri_xades_core::Error;

/// Decode the container and pick the signing key and certificate.
pub(crate) fn load_pkcs12(
    data: &[u8],
    password: &str,
    selection: BagSelection,
) -> Result<SigningIdentity, Error> {
    let contents = sri_xades_pkcs12::parse_pkcs12(data, password)?;

    if contents.private_keys.is_empty() {
        return Err(Error::IdentityLoad("PKCS#12 contains no private keys".into()));
    }
    if contents.certificates.is_empty() {
        return Err(Error::IdentityLoad("PKCS#12 contains no certificates".into()));
    }
    if selection == BagSelection::Strict
        && (contents.private_keys.len() != 1 || contents.certificates.len() != 1)
    {
        return Err(Error::IdentityLoad(format!(
            "expected exactly one key and one certificate, found {} keys and {} certificates",
            contents.private_keys.len(),
            contents.certificates.len()
        )));
    }
    if contents.private_keys.len() > 1 {
        warn!(
            "PKCS#12 holds {} private keys; using the first",
            contents.private_keys.len()
        );
    }

    let private_key = load_rsa_private_pkcs8_der(&contents.private_keys[0])?;

    let mut certificates = Vec::with_capacity(contents.certificates.len());
    for der in &contents.certificates {
        let cert = CertificateInfo::from_der(der)
            .map_err(|e| Error::IdentityLoad(e.to_string()))?;
        certificates.push(cert);
    }

    let index = match selection {
        BagSelection::First | BagSelection::Strict => 0,
        BagSelection::MatchingKey => {
            let public_key = private_key.to_public_key();
            certificates
                .iter()
                .position(|c| *c.public_key() == public_key)
                .ok_or_else(|| {
                    Error::IdentityLoad(
                        "no certificate in the container matches the private key".into(),
                    )
                })?
        }
    };
    if selection == BagSelection::First && certificates.len() > 1 {
        warn!(
            "PKCS#12 holds {} certificates; using the first",
            certificates.len()
        );
    }

    let certificate = certificates.remove(index);
    let chain = certificates.into_iter().map(|c| c.der().to_vec()).collect();

    info!(
        "loaded signing identity: subject={} issuer={} valid {} to {}",
        certificate.subject_cn().unwrap_or(certificate.subject()),
        certificate.issuer_cn().unwrap_or(certificate.issuer()),
        certificate.not_before().format("%Y-%m-%d"),
        certificate.not_after().format("%Y-%m-%d"),
    );
    let now = chrono::Utc::now();
    if !certificate.is_valid_at(now) {
        warn!(
            "signing certificate is outside its validity window ({} to {})",
            certificate.not_before(),
            certificate.not_after()
        );
    }

    Ok(SigningIdentity {
        certificate,
        private_key,
        chain,
    })
}

/// Decode a PKCS#8 DER private key, which must be RSA.
fn load_rsa_private_pkcs8_der(der: &[u8]) -> Result<RsaPrivateKey, Error> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| Error::IdentityLoad(format!("unable to parse RSA private key: {e}")))
}
