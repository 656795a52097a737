#![forbid(unsafe_code)]

//! Key derivation and decryption for PKCS#12.
//!
//! Three paths:
//! 1. PKCS#12 KDF (RFC 7292 Appendix B) for MAC keys and legacy PBE
//! 2. Legacy PBE: pbeWithSHAAnd3-KeyTripleDES-CBC using the PKCS#12 KDF
//! 3. PBES2: PBKDF2 + AES-256-CBC

use cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use sri_xades_core::Error;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Des3CbcDec = cbc::Decryptor<des::TdesEde3>;

/// PKCS#12 KDF ID values (RFC 7292 Appendix B.3).
pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// PKCS#12 KDF with SHA-1 (u=20, v=64).
///
/// `password` is the BMP-encoded password from [`password_to_bmp`].
pub fn pkcs12_kdf_sha1(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    pkcs12_kdf_generic::<Sha1>(id, password, salt, iterations, output_len, 20, 64)
}

/// PKCS#12 KDF with SHA-256 (u=32, v=64).
pub fn pkcs12_kdf_sha256(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    pkcs12_kdf_generic::<Sha256>(id, password, salt, iterations, output_len, 32, 64)
}

fn pkcs12_kdf_generic<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
    u: usize,
    v: usize,
) -> Vec<u8>
where
    D: Digest + sha2::digest::FixedOutputReset,
{
    let d_block = vec![id; v];
    let s = extend_to_multiple(salt, v);
    let p = extend_to_multiple(password, v);

    // I = S || P
    let mut i_block = Vec::with_capacity(s.len() + p.len());
    i_block.extend_from_slice(&s);
    i_block.extend_from_slice(&p);

    let num_blocks = output_len.div_ceil(u);
    let mut result = Vec::with_capacity(num_blocks * u);

    for block_idx in 0..num_blocks {
        // A = H^c(D || I)
        let mut hasher = D::new();
        Digest::update(&mut hasher, &d_block);
        Digest::update(&mut hasher, &i_block);
        let mut a = hasher.finalize_reset();

        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }

        result.extend_from_slice(&a);

        if block_idx + 1 < num_blocks {
            // I_j = (I_j + B + 1) mod 2^(v*8)
            let b = extend_to_multiple(&a, v);
            for j in 0..(i_block.len() / v) {
                add_one_plus_b(&mut i_block[j * v..(j + 1) * v], &b);
            }
        }
    }

    result.truncate(output_len);
    result
}

/// Repeat `data` up to the next multiple of `v` bytes. Empty stays empty.
fn extend_to_multiple(data: &[u8], v: usize) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(v) * v;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let take = (len - out.len()).min(data.len());
        out.extend_from_slice(&data[..take]);
    }
    out
}

fn add_one_plus_b(block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for k in (0..block.len()).rev() {
        let sum = block[k] as u16 + b[k] as u16 + carry;
        block[k] = sum as u8;
        carry = sum >> 8;
    }
}

/// Encode a password as BMP (UTF-16BE) with two trailing zero bytes.
///
/// The empty password encodes to the bare terminator, as RFC 7292 B.1 reads.
pub fn password_to_bmp(password: &str) -> Vec<u8> {
    let mut bmp = Vec::with_capacity(password.len() * 2 + 2);
    for c in password.encode_utf16() {
        bmp.push((c >> 8) as u8);
        bmp.push(c as u8);
    }
    bmp.push(0);
    bmp.push(0);
    bmp
}

/// BMP encodings worth trying for `password`, most likely first.
///
/// Some producers derive keys for the empty password from a zero-length
/// string instead of the terminator alone, so both are offered.
pub fn password_candidates(password: &str) -> Vec<Vec<u8>> {
    if password.is_empty() {
        vec![password_to_bmp(password), Vec::new()]
    } else {
        vec![password_to_bmp(password)]
    }
}

/// Decrypt with pbeWithSHAAnd3-KeyTripleDES-CBC (24-byte key, 8-byte IV).
pub fn decrypt_pbe_sha1_3des(
    ciphertext: &[u8],
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let key = pkcs12_kdf_sha1(ID_KEY, password, salt, iterations, 24);
    let iv = pkcs12_kdf_sha1(ID_IV, password, salt, iterations, 8);

    let decryptor = Des3CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| Error::IdentityLoad(format!("3DES-CBC init failed: {e}")))?;

    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| Error::IdentityLoad(format!("3DES-CBC decrypt/unpad failed: {e}")))?;

    Ok(plaintext.to_vec())
}

/// PRF used by PBKDF2 inside PBES2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pbkdf2Prf {
    HmacSha1,
    HmacSha256,
}

/// Decrypt with PBES2: PBKDF2 (HMAC-SHA1 or HMAC-SHA256) + AES-256-CBC.
pub fn decrypt_pbes2_aes256cbc(
    ciphertext: &[u8],
    password: &str,
    prf: Pbkdf2Prf,
    salt: &[u8],
    iterations: u32,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = [0u8; 32];
    match prf {
        Pbkdf2Prf::HmacSha1 => {
            pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key)
        }
        Pbkdf2Prf::HmacSha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key)
        }
    }

    let decryptor = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|e| Error::IdentityLoad(format!("AES-256-CBC init failed: {e}")))?;

    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| Error::IdentityLoad(format!("AES-256-CBC decrypt/unpad failed: {e}")))?;

    Ok(plaintext.to_vec())
}

pub fn compute_hmac_sha1(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|e| Error::IdentityLoad(format!("HMAC-SHA1 init failed: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn compute_hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| Error::IdentityLoad(format!("HMAC-SHA256 init failed: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
