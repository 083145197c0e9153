#![forbid(unsafe_code)]

//! BER parsing of the PKCS#12 PFX structure (RFC 7292).
//!
//! Uses `yasna::parse_ber` since PKCS#12 files are BER, not strict DER.

use selo_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};

use crate::derive::{self, MacHash, Pbe, Prf};
use crate::PfxContents;

// ── OID constants ──────────────────────────────────────────────────────────

// Content types (PKCS#7)
const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

// Bag types (PKCS#12)
const OID_PKCS8_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const OID_CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];

// Certificate type
const OID_X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

// Encryption schemes
const OID_PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];
const OID_AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

// Hash / HMAC
const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const OID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const OID_HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const OID_HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

// ── Parsed structures ──────────────────────────────────────────────────────

struct MacData {
    hash: MacHash,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum SafeBag {
    ShroudedKey { pbe: Pbe, ciphertext: Vec<u8> },
    Certificate { der: Vec<u8> },
    Other,
}

enum ContentInfo {
    Plain(Vec<u8>),
    Encrypted { pbe: Pbe, ciphertext: Vec<u8> },
}

// ── Top-level parser ───────────────────────────────────────────────────────

pub fn parse_pfx(data: &[u8], password: &str) -> Result<PfxContents, Error> {
    let (auth_safe, mac_data) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            let version = r.next().read_u32()?;
            if version != 3 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let auth_safe = read_outer_content_info(r.next())?;
            let mac_data = r.read_optional(read_mac_data)?;
            Ok((auth_safe, mac_data))
        })
    })
    .map_err(|e| Error::Key(format!("failed to parse PKCS#12 PFX: {e}")))?;

    let bmp_password = derive::password_to_bmp(password);

    // MAC first: a wrong password must fail before any decryption runs.
    if let Some(ref mac) = mac_data {
        let computed =
            derive::compute_mac(mac.hash, &bmp_password, &mac.salt, mac.iterations, &auth_safe);
        if computed != mac.digest {
            return Err(Error::Key(
                "PKCS#12 MAC verification failed (wrong password?)".into(),
            ));
        }
    }

    let content_infos = yasna::parse_ber(&auth_safe, |r| {
        r.collect_sequence_of(read_content_info)
    })
    .map_err(|e| Error::Key(format!("failed to parse PKCS#12 authSafe: {e}")))?;

    let mut private_keys = Vec::new();
    let mut certificates = Vec::new();

    for ci in content_infos {
        let bags_der = match ci {
            ContentInfo::Plain(data) => data,
            ContentInfo::Encrypted { pbe, ciphertext } => {
                derive::decrypt(&pbe, &ciphertext, password, &bmp_password)?
            }
        };

        let bags = yasna::parse_ber(&bags_der, |r| r.collect_sequence_of(read_safe_bag))
            .map_err(|e| Error::Key(format!("failed to parse PKCS#12 SafeBags: {e}")))?;

        for bag in bags {
            match bag {
                SafeBag::ShroudedKey { pbe, ciphertext } => {
                    private_keys.push(derive::decrypt(&pbe, &ciphertext, password, &bmp_password)?);
                }
                SafeBag::Certificate { der } => certificates.push(der),
                SafeBag::Other => {}
            }
        }
    }

    Ok(PfxContents {
        private_keys,
        certificates,
    })
}

// ── ContentInfo parsing ────────────────────────────────────────────────────

/// The top-level authSafe wrapper: ContentInfo with type `data` carrying
/// an OCTET STRING payload.
fn read_outer_content_info(r: BERReader) -> Result<Vec<u8>, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if content_type != oid(OID_DATA) {
            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

/// A ContentInfo inside the authSafe SEQUENCE: plain `data` or
/// `encryptedData`.
fn read_content_info(r: BERReader) -> Result<ContentInfo, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;

        if content_type == oid(OID_DATA) {
            let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            Ok(ContentInfo::Plain(data))
        } else if content_type == oid(OID_ENCRYPTED_DATA) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let _version = r.next().read_u32()?;
                    // EncryptedContentInfo
                    r.next().read_sequence(|r| {
                        let _inner_type = r.next().read_oid()?;
                        let pbe = read_pbe(r.next())?;
                        let ciphertext = r
                            .next()
                            .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                        Ok(ContentInfo::Encrypted { pbe, ciphertext })
                    })
                })
            })
        } else {
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        }
    })
}

// ── SafeBag parsing ────────────────────────────────────────────────────────

fn read_safe_bag(r: BERReader) -> Result<SafeBag, ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;

        if bag_type == oid(OID_PKCS8_SHROUDED_KEY_BAG) {
            // [0] EXPLICIT EncryptedPrivateKeyInfo
            let (pbe, ciphertext) = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let pbe = read_pbe(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok((pbe, ciphertext))
                })
            })?;
            skip_bag_attributes(r)?;
            Ok(SafeBag::ShroudedKey { pbe, ciphertext })
        } else if bag_type == oid(OID_CERT_BAG) {
            // [0] EXPLICIT CertBag with an X.509 certificate payload
            let der = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let cert_type = r.next().read_oid()?;
                    if cert_type != oid(OID_X509_CERTIFICATE) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
                })
            })?;
            skip_bag_attributes(r)?;
            Ok(SafeBag::Certificate { der })
        } else {
            let _value = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            skip_bag_attributes(r)?;
            Ok(SafeBag::Other)
        }
    })
}

/// Read and discard the optional bag attribute SET.
fn skip_bag_attributes(r: &mut yasna::BERReaderSeq<'_, '_>) -> Result<(), ASN1Error> {
    let _attrs = r.read_optional(|r| {
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

// ── Encryption AlgorithmIdentifier parsing ─────────────────────────────────

fn read_pbe(r: BERReader) -> Result<Pbe, ASN1Error> {
    r.read_sequence(|r| {
        let alg_oid = r.next().read_oid()?;

        if alg_oid == oid(OID_PBE_SHA1_3DES) {
            // Legacy params: SEQUENCE { salt OCTET STRING, iterations INTEGER }
            r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(Pbe::Sha1Des3 { salt, iterations })
            })
        } else if alg_oid == oid(OID_PBES2) {
            // PBES2-params: SEQUENCE { keyDerivationFunc, encryptionScheme }
            r.next().read_sequence(|r| {
                let (salt, iterations, prf) = r.next().read_sequence(|r| {
                    let kdf_oid = r.next().read_oid()?;
                    if kdf_oid != oid(OID_PBKDF2) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    // PBKDF2-params: SEQUENCE { salt, iterationCount,
                    // keyLength OPTIONAL, prf OPTIONAL }
                    r.next().read_sequence(|r| {
                        let salt = r.next().read_bytes()?;
                        let iterations = r.next().read_u32()?;
                        let mut prf = Prf::HmacSha1; // RFC 8018 default

                        // The next element is either keyLength (INTEGER)
                        // or the PRF AlgorithmIdentifier (SEQUENCE).
                        let trailing = r.read_optional(|r| r.read_der())?;
                        if let Some(der_bytes) = trailing {
                            if der_bytes.first() == Some(&0x30) {
                                prf = read_prf(&der_bytes)?;
                            } else if let Some(prf_der) = r.read_optional(|r| r.read_der())? {
                                prf = read_prf(&prf_der)?;
                            }
                        }

                        Ok((salt, iterations, prf))
                    })
                })?;

                let iv = r.next().read_sequence(|r| {
                    let enc_oid = r.next().read_oid()?;
                    if enc_oid != oid(OID_AES_256_CBC) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_bytes()
                })?;

                Ok(Pbe::Pbes2 {
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

/// Parse a PRF AlgorithmIdentifier from raw DER bytes.
fn read_prf(der: &[u8]) -> Result<Prf, ASN1Error> {
    yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let prf_oid = r.next().read_oid()?;
            let _null = r.read_optional(|r| r.read_null())?;
            if prf_oid == oid(OID_HMAC_SHA256) {
                Ok(Prf::HmacSha256)
            } else if prf_oid == oid(OID_HMAC_SHA1) {
                Ok(Prf::HmacSha1)
            } else {
                Err(ASN1Error::new(ASN1ErrorKind::Invalid))
            }
        })
    })
}

// ── MacData parsing ────────────────────────────────────────────────────────

fn read_mac_data(r: BERReader) -> Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        // DigestInfo: SEQUENCE { digestAlgorithm, digest }
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let hash_oid = r.next().read_oid()?;
                let _null = r.read_optional(|r| r.read_null())?;
                if hash_oid == oid(OID_SHA256) {
                    Ok(MacHash::Sha256)
                } else if hash_oid == oid(OID_SHA1) {
                    Ok(MacHash::Sha1)
                } else {
                    Err(ASN1Error::new(ASN1ErrorKind::Invalid))
                }
            })?;
            let digest = r.next().read_bytes()?;
            Ok((hash, digest))
        })?;

        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);

        Ok(MacData {
            hash,
            digest,
            salt,
            iterations,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Option<Vec<u8>> {
        let p12_path = std::path::Path::new("../../test-data/keys/signer.p12");
        if !p12_path.exists() {
            eprintln!("skipping test: {p12_path:?} not found");
            return None;
        }
        Some(std::fs::read(p12_path).unwrap())
    }

    #[test]
    fn test_parse_signer_p12() {
        let Some(data) = fixture() else { return };
        let contents = parse_pfx(&data, "secret123").expect("parse_pfx should succeed");

        assert_eq!(contents.private_keys.len(), 1, "expected 1 private key");
        assert!(
            !contents.certificates.is_empty(),
            "expected at least 1 certificate"
        );
        // The private key must be PKCS#8 DER (starts with a SEQUENCE tag).
        assert_eq!(contents.private_keys[0][0], 0x30);
        assert_eq!(contents.certificates[0][0], 0x30);
    }

    #[test]
    fn test_wrong_password_fails_mac() {
        let Some(data) = fixture() else { return };
        let err = parse_pfx(&data, "wrong_password").unwrap_err();
        let msg = err.to_string();
        assert!(
            msg.contains("MAC verification failed"),
            "expected MAC error, got: {msg}"
        );
    }

    #[test]
    fn test_garbage_input_fails_parse() {
        let err = parse_pfx(b"not a pfx at all", "pw").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}
