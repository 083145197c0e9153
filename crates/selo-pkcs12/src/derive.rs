#![forbid(unsafe_code)]

//! Key derivation and content decryption for PKCS#12.
//!
//! Implements the PKCS#12 KDF (RFC 7292 Appendix B) for MAC keys and
//! legacy PBE, plus PBKDF2-based PBES2 decryption.

use selo_core::Error;
use cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::Hmac;
use sha1::Sha1;
use sha2::{Digest, Sha256};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Des3CbcDec = cbc::Decryptor<des::TdesEde3>;

/// PKCS#12 KDF purpose IDs (RFC 7292 Appendix B.3).
pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// The encryption scheme protecting a content blob or key bag.
#[derive(Debug)]
pub enum Pbe {
    /// pbeWithSHAAnd3-KeyTripleDES-CBC
    Sha1Des3 { salt: Vec<u8>, iterations: u32 },
    /// PBES2 with PBKDF2 and AES-256-CBC
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: Prf,
        iv: Vec<u8>,
    },
}

/// The PBKDF2 pseudo-random function.
#[derive(Debug, Clone, Copy)]
pub enum Prf {
    HmacSha1,
    HmacSha256,
}

/// The hash protecting the PFX integrity MAC.
#[derive(Debug, Clone, Copy)]
pub enum MacHash {
    Sha1,
    Sha256,
}

/// Decrypt a ciphertext protected by `pbe`.
///
/// `bmp_password` is the BMP encoding used by the PKCS#12 KDF;
/// `password` the raw UTF-8 form used by PBKDF2.
pub fn decrypt(
    pbe: &Pbe,
    ciphertext: &[u8],
    password: &str,
    bmp_password: &[u8],
) -> Result<Vec<u8>, Error> {
    match pbe {
        Pbe::Sha1Des3 { salt, iterations } => {
            let key = kdf_sha1(ID_KEY, bmp_password, salt, *iterations, 24);
            let iv = kdf_sha1(ID_IV, bmp_password, salt, *iterations, 8);
            let decryptor = Des3CbcDec::new_from_slices(&key, &iv)
                .map_err(|e| Error::Key(format!("3DES-CBC init failed: {e}")))?;
            let mut buf = ciphertext.to_vec();
            let plaintext = decryptor
                .decrypt_padded_mut::<Pkcs7>(&mut buf)
                .map_err(|e| Error::Key(format!("3DES-CBC decrypt failed: {e}")))?;
            Ok(plaintext.to_vec())
        }
        Pbe::Pbes2 {
            salt,
            iterations,
            prf,
            iv,
        } => {
            let mut key = [0u8; 32];
            match prf {
                Prf::HmacSha1 => {
                    pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, *iterations, &mut key)
                }
                Prf::HmacSha256 => {
                    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, *iterations, &mut key)
                }
            }
            let decryptor = Aes256CbcDec::new_from_slices(&key, iv)
                .map_err(|e| Error::Key(format!("AES-256-CBC init failed: {e}")))?;
            let mut buf = ciphertext.to_vec();
            let plaintext = decryptor
                .decrypt_padded_mut::<Pkcs7>(&mut buf)
                .map_err(|e| Error::Key(format!("AES-256-CBC decrypt failed: {e}")))?;
            Ok(plaintext.to_vec())
        }
    }
}

/// Compute the integrity MAC over the authSafe contents.
pub fn compute_mac(
    hash: MacHash,
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
    data: &[u8],
) -> Vec<u8> {
    use hmac::Mac;
    match hash {
        MacHash::Sha1 => {
            let key = kdf_sha1(ID_MAC, bmp_password, salt, iterations, 20);
            let mut mac = Hmac::<Sha1>::new_from_slice(&key).expect("HMAC accepts any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        MacHash::Sha256 => {
            let key = kdf_sha256(ID_MAC, bmp_password, salt, iterations, 32);
            let mut mac = Hmac::<Sha256>::new_from_slice(&key).expect("HMAC accepts any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// PKCS#12 KDF with SHA-1 (u=20, v=64).
pub fn kdf_sha1(id: u8, password: &[u8], salt: &[u8], iterations: u32, out_len: usize) -> Vec<u8> {
    kdf_generic::<Sha1>(id, password, salt, iterations, out_len, 20, 64)
}

/// PKCS#12 KDF with SHA-256 (u=32, v=64).
pub fn kdf_sha256(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out_len: usize,
) -> Vec<u8> {
    kdf_generic::<Sha256>(id, password, salt, iterations, out_len, 32, 64)
}

/// PKCS#12 KDF (RFC 7292 Appendix B).
///
/// `id` selects the derivation purpose (key, IV or MAC key), `password`
/// is the BMP-encoded password, `u` the hash output size and `v` the
/// hash block size.
fn kdf_generic<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out_len: usize,
    u: usize,
    v: usize,
) -> Vec<u8>
where
    D: Digest + sha2::digest::FixedOutputReset,
{
    // D = id repeated v times; I = S || P with salt and password each
    // extended to a multiple of v.
    let d_block = vec![id; v];
    let s = repeat_to_multiple(salt, v);
    let p = repeat_to_multiple(password, v);
    let mut i_block = Vec::with_capacity(s.len() + p.len());
    i_block.extend_from_slice(&s);
    i_block.extend_from_slice(&p);

    let num_blocks = out_len.div_ceil(u);
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
            // I_j = (I_j + B + 1) mod 2^(v*8), with B = A extended to v.
            let b = repeat_to_multiple(&a, v);
            for j in 0..(i_block.len() / v) {
                add_with_carry(&mut i_block[j * v..(j + 1) * v], &b);
            }
        }
    }

    result.truncate(out_len);
    result
}

/// Repeat `data` to fill a multiple of `v` bytes; empty input stays empty.
fn repeat_to_multiple(data: &[u8], v: usize) -> Vec<u8> {
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

/// In-place (block + b + 1) mod 2^(len*8), big-endian.
fn add_with_carry(block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for k in (0..block.len()).rev() {
        let sum = block[k] as u16 + b[k] as u16 + carry;
        block[k] = sum as u8;
        carry = sum >> 8;
    }
}

/// Encode a password as BMP (UTF-16BE with two trailing zero bytes), per
/// the PKCS#12 spec. The empty password encodes to the empty string.
pub fn password_to_bmp(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let mut bmp = Vec::with_capacity(password.len() * 2 + 2);
    for c in password.encode_utf16() {
        bmp.push((c >> 8) as u8);
        bmp.push(c as u8);
    }
    bmp.push(0);
    bmp.push(0);
    bmp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdf_is_deterministic_and_purpose_separated() {
        let password = password_to_bmp("test");
        let salt = b"saltsalt";
        let key = kdf_sha1(ID_KEY, &password, salt, 2048, 24);
        assert_eq!(key.len(), 24);
        assert_eq!(key, kdf_sha1(ID_KEY, &password, salt, 2048, 24));

        let iv = kdf_sha1(ID_IV, &password, salt, 2048, 8);
        assert_eq!(iv.len(), 8);
        assert_ne!(&key[..8], &iv[..]);
    }

    #[test]
    fn test_kdf_sha256_output_len() {
        let password = password_to_bmp("test");
        assert_eq!(kdf_sha256(ID_MAC, &password, b"saltsalt", 2048, 32).len(), 32);
    }

    #[test]
    fn test_password_to_bmp() {
        assert!(password_to_bmp("").is_empty());
        assert_eq!(password_to_bmp("A"), vec![0x00, 0x41, 0x00, 0x00]);
        assert_eq!(
            password_to_bmp("ab"),
            vec![0x00, 0x61, 0x00, 0x62, 0x00, 0x00]
        );
    }
}
