#![forbid(unsafe_code)]

//! BER parsing of PKCS#12 (PFX) structures (RFC 7292).
//!
//! Uses `yasna::parse_ber` since PKCS#12 files use BER encoding, not strict DER.

use sri_xades_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};

use crate::kdf::{self, Pbkdf2Prf};
use crate::Pkcs12Contents;

// ── OID constants ──────────────────────────────────────────────────────────

// Content types (PKCS#7)
const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

// Bag types (PKCS#12)
const OID_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
const OID_PKCS8_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const OID_CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];

// Certificate type
const OID_X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

// PBE algorithms
const OID_PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

// Cipher
const OID_AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

// Hash / HMAC
const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const OID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const OID_HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const OID_HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

// ── Algorithm types ────────────────────────────────────────────────────────

#[derive(Debug)]
enum EncryptionAlgorithm {
    PbeSha1And3Des {
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: Pbkdf2Prf,
        iv: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy)]
enum MacHashAlgorithm {
    Sha1,
    Sha256,
}

// ── Parsed structures ──────────────────────────────────────────────────────

struct MacData {
    digest_algorithm: MacHashAlgorithm,
    digest_value: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum SafeBag {
    KeyBag {
        pkcs8_der: Vec<u8>,
    },
    ShroudedKeyBag {
        algorithm: EncryptionAlgorithm,
        ciphertext: Vec<u8>,
    },
    CertBag {
        cert_der: Vec<u8>,
    },
    Other,
}

enum ContentInfoInner {
    Data(Vec<u8>),
    EncryptedData {
        algorithm: EncryptionAlgorithm,
        ciphertext: Vec<u8>,
    },
}

// ── Top-level parser ───────────────────────────────────────────────────────

pub fn parse_pfx(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    let (auth_safe_data, mac_data) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            let version = r.next().read_u32()?;
            if version != 3 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let auth_safe_data = parse_content_info_data(r.next())?;
            let mac_data = r.read_optional(parse_mac_data)?;
            Ok((auth_safe_data, mac_data))
        })
    })
    .map_err(|e| Error::IdentityLoad(format!("failed to parse PKCS#12 PFX: {e}")))?;

    // The MAC tells us which BMP encoding of the password the producer used.
    let bmp_password = match &mac_data {
        Some(mac) => verify_mac(mac, &auth_safe_data, password)?,
        None => {
            log::warn!("PKCS#12 container carries no MAC; integrity not checked");
            kdf::password_to_bmp(password)
        }
    };

    let content_infos = yasna::parse_ber(&auth_safe_data, |r| {
        r.collect_sequence_of(parse_content_info_inner)
    })
    .map_err(|e| Error::IdentityLoad(format!("failed to parse authSafe contents: {e}")))?;

    let mut contents = Pkcs12Contents::default();

    for ci in content_infos {
        let bags_data = match ci {
            ContentInfoInner::Data(data) => data,
            ContentInfoInner::EncryptedData {
                algorithm,
                ciphertext,
            } => decrypt_data(&algorithm, &ciphertext, password, &bmp_password)?,
        };

        let bags = yasna::parse_ber(&bags_data, |r| r.collect_sequence_of(parse_safe_bag))
            .map_err(|e| Error::IdentityLoad(format!("failed to parse SafeBags: {e}")))?;

        for bag in bags {
            match bag {
                SafeBag::KeyBag { pkcs8_der } => contents.private_keys.push(pkcs8_der),
                SafeBag::ShroudedKeyBag {
                    algorithm,
                    ciphertext,
                } => {
                    let pkcs8_der =
                        decrypt_data(&algorithm, &ciphertext, password, &bmp_password)?;
                    contents.private_keys.push(pkcs8_der);
                }
                SafeBag::CertBag { cert_der } => contents.certificates.push(cert_der),
                SafeBag::Other => {}
            }
        }
    }

    log::debug!(
        "PKCS#12 parsed: {} key bag(s), {} certificate bag(s)",
        contents.private_keys.len(),
        contents.certificates.len()
    );

    Ok(contents)
}

// ── ContentInfo parsing ────────────────────────────────────────────────────

/// Parse the top-level ContentInfo wrapping the authSafe (OID = data).
fn parse_content_info_data(r: BERReader) -> Result<Vec<u8>, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if content_type != oid(OID_DATA) {
            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

/// Parse a ContentInfo inside the authSafe SEQUENCE.
fn parse_content_info_inner(r: BERReader) -> Result<ContentInfoInner, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;

        if content_type == oid(OID_DATA) {
            let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            Ok(ContentInfoInner::Data(data))
        } else if content_type == oid(OID_ENCRYPTED_DATA) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let _version = r.next().read_u32()?;
                    r.next().read_sequence(|r| {
                        let _content_type = r.next().read_oid()?;
                        let algorithm = parse_algorithm_identifier(r.next())?;
                        let ciphertext = r
                            .next()
                            .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                        Ok(ContentInfoInner::EncryptedData {
                            algorithm,
                            ciphertext,
                        })
                    })
                })
            })
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

// ── SafeBag parsing ────────────────────────────────────────────────────────

fn parse_safe_bag(r: BERReader) -> Result<SafeBag, ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;

        let bag = if bag_type == oid(OID_KEY_BAG) {
            let pkcs8_der = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            SafeBag::KeyBag { pkcs8_der }
        } else if bag_type == oid(OID_PKCS8_SHROUDED_KEY_BAG) {
            let (algorithm, ciphertext) = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let algorithm = parse_algorithm_identifier(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok((algorithm, ciphertext))
                })
            })?;
            SafeBag::ShroudedKeyBag {
                algorithm,
                ciphertext,
            }
        } else if bag_type == oid(OID_CERT_BAG) {
            let cert_der = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let cert_type = r.next().read_oid()?;
                    if cert_type != oid(OID_X509_CERTIFICATE) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
                })
            })?;
            SafeBag::CertBag { cert_der }
        } else {
            let _value = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            SafeBag::Other
        };

        // friendlyName, localKeyId and friends are not needed.
        skip_bag_attributes(r)?;
        Ok(bag)
    })
}

fn skip_bag_attributes(r: &mut yasna::BERReaderSeq<'_, '_>) -> Result<(), ASN1Error> {
    r.read_optional(|r| {
        r.read_set_of(|r| {
            r.read_sequence(|r| {
                let _oid = r.next().read_oid()?;
                r.next().read_set_of(|r| {
                    let _ = r.read_der()?;
                    Ok(())
                })?;
                Ok(())
            })
        })
    })?;
    Ok(())
}

// ── AlgorithmIdentifier parsing ────────────────────────────────────────────

fn parse_algorithm_identifier(r: BERReader) -> Result<EncryptionAlgorithm, ASN1Error> {
    r.read_sequence(|r| {
        let alg_oid = r.next().read_oid()?;

        if alg_oid == oid(OID_PBE_SHA1_3DES) {
            // pkcs-12PbeParams: SEQUENCE { salt OCTET STRING, iterations INTEGER }
            r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(EncryptionAlgorithm::PbeSha1And3Des { salt, iterations })
            })
        } else if alg_oid == oid(OID_PBES2) {
            // PBES2-params: SEQUENCE { keyDerivationFunc, encryptionScheme }
            r.next().read_sequence(|r| {
                let (salt, iterations, prf) = r.next().read_sequence(|r| {
                    let kdf_oid = r.next().read_oid()?;
                    if kdf_oid != oid(OID_PBKDF2) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_sequence(parse_pbkdf2_params)
                })?;

                let iv = r.next().read_sequence(|r| {
                    let enc_oid = r.next().read_oid()?;
                    if enc_oid != oid(OID_AES_256_CBC) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_bytes()
                })?;

                Ok(EncryptionAlgorithm::Pbes2 {
                    salt,
                    iterations,
                    prf,
                    iv,
                })
            })
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

/// PBKDF2-params: SEQUENCE { salt, iterationCount, keyLength?, prf? }
fn parse_pbkdf2_params(
    r: &mut yasna::BERReaderSeq<'_, '_>,
) -> Result<(Vec<u8>, u32, Pbkdf2Prf), ASN1Error> {
    let salt = r.next().read_bytes()?;
    let iterations = r.next().read_u32()?;

    // keyLength is an INTEGER, prf a SEQUENCE; both optional.
    let mut prf = Pbkdf2Prf::HmacSha1;
    if let Some(der_bytes) = r.read_optional(|r| r.read_der())? {
        if der_bytes.first() == Some(&0x30) {
            prf = parse_prf_from_der(&der_bytes)?;
        } else if let Some(prf_der) = r.read_optional(|r| r.read_der())? {
            prf = parse_prf_from_der(&prf_der)?;
        }
    }

    Ok((salt, iterations, prf))
}

fn parse_prf_from_der(der: &[u8]) -> Result<Pbkdf2Prf, ASN1Error> {
    yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let prf_oid = r.next().read_oid()?;
            let _null = r.read_optional(|r| r.read_null())?;
            if prf_oid == oid(OID_HMAC_SHA256) {
                Ok(Pbkdf2Prf::HmacSha256)
            } else if prf_oid == oid(OID_HMAC_SHA1) {
                Ok(Pbkdf2Prf::HmacSha1)
            } else {
                Err(ASN1Error::new(ASN1ErrorKind::Invalid))
            }
        })
    })
}

// ── MAC verification ───────────────────────────────────────────────────────

fn parse_mac_data(r: BERReader) -> Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        // DigestInfo: SEQUENCE { digestAlgorithm, digest }
        let (digest_algorithm, digest_value) = r.next().read_sequence(|r| {
            let alg = r.next().read_sequence(|r| {
                let hash_oid = r.next().read_oid()?;
                let _null = r.read_optional(|r| r.read_null())?;
                if hash_oid == oid(OID_SHA256) {
                    Ok(MacHashAlgorithm::Sha256)
                } else if hash_oid == oid(OID_SHA1) {
                    Ok(MacHashAlgorithm::Sha1)
                } else {
                    Err(ASN1Error::new(ASN1ErrorKind::Invalid))
                }
            })?;
            let digest = r.next().read_bytes()?;
            Ok((alg, digest))
        })?;

        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);

        Ok(MacData {
            digest_algorithm,
            digest_value,
            salt,
            iterations,
        })
    })
}

/// Check the container MAC, returning the BMP password encoding that matched.
fn verify_mac(mac: &MacData, auth_safe_data: &[u8], password: &str) -> Result<Vec<u8>, Error> {
    for bmp_password in kdf::password_candidates(password) {
        let computed = match mac.digest_algorithm {
            MacHashAlgorithm::Sha1 => {
                let key =
                    kdf::pkcs12_kdf_sha1(kdf::ID_MAC, &bmp_password, &mac.salt, mac.iterations, 20);
                kdf::compute_hmac_sha1(&key, auth_safe_data)?
            }
            MacHashAlgorithm::Sha256 => {
                let key = kdf::pkcs12_kdf_sha256(
                    kdf::ID_MAC,
                    &bmp_password,
                    &mac.salt,
                    mac.iterations,
                    32,
                );
                kdf::compute_hmac_sha256(&key, auth_safe_data)?
            }
        };
        if computed == mac.digest_value {
            return Ok(bmp_password);
        }
    }

    Err(Error::IdentityLoad(
        "PKCS#12 MAC verification failed (wrong password?)".into(),
    ))
}

// ── Decryption dispatch ────────────────────────────────────────────────────

fn decrypt_data(
    algorithm: &EncryptionAlgorithm,
    ciphertext: &[u8],
    password: &str,
    bmp_password: &[u8],
) -> Result<Vec<u8>, Error> {
    match algorithm {
        EncryptionAlgorithm::PbeSha1And3Des { salt, iterations } => {
            kdf::decrypt_pbe_sha1_3des(ciphertext, bmp_password, salt, *iterations)
        }
        EncryptionAlgorithm::Pbes2 {
            salt,
            iterations,
            prf,
            iv,
        } => kdf::decrypt_pbes2_aes256cbc(ciphertext, password, *prf, salt, *iterations, iv),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> Option<Vec<u8>> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../test-data/keys")
            .join(name);
        if !path.exists() {
            eprintln!("skipping test: {path:?} not found");
            return None;
        }
        Some(std::fs::read(path).unwrap())
    }

    #[test]
    fn test_parse_pbes2_chain_p12() {
        let Some(data) = fixture("identity.p12") else { return };
        let contents = parse_pfx(&data, "secret123").expect("parse_pfx should succeed");

        assert_eq!(contents.private_keys.len(), 1, "expected 1 private key");
        assert_eq!(contents.certificates.len(), 2, "expected leaf + CA");
        // PKCS#8 DER starts with a SEQUENCE tag.
        assert_eq!(contents.private_keys[0][0], 0x30);
        assert_eq!(contents.certificates[0][0], 0x30);
    }

    #[test]
    fn test_parse_legacy_3des_p12() {
        let Some(data) = fixture("identity-legacy.p12") else { return };
        let contents = parse_pfx(&data, "secret123").expect("parse_pfx should succeed");
        assert_eq!(contents.private_keys.len(), 1);
        assert_eq!(contents.certificates.len(), 1);
    }

    #[test]
    fn test_parse_empty_password_p12() {
        let Some(data) = fixture("identity-nopass.p12") else { return };
        let contents = parse_pfx(&data, "").expect("empty password should be accepted");
        assert_eq!(contents.private_keys.len(), 1);
        assert_eq!(contents.certificates.len(), 1);
    }

    #[test]
    fn test_wrong_password_fails_mac() {
        let Some(data) = fixture("identity.p12") else { return };
        let err = parse_pfx(&data, "wrong_password").unwrap_err();
        assert!(matches!(err, Error::IdentityLoad(_)));
        assert!(
            err.to_string().contains("MAC verification failed"),
            "expected MAC error, got: {err}"
        );
    }

    #[test]
    fn test_garbage_is_identity_load_error() {
        let err = parse_pfx(b"definitely not a pfx", "x").unwrap_err();
        assert!(matches!(err, Error::IdentityLoad(_)));
    }
}
