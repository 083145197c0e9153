#![forbid(unsafe_code)]

//! RSA PKCS#1 v1.5 signing over SHA-1 (the `rsa-sha1` signature method).

use selo_core::Error;
use signature::SignatureEncoding;

/// Sign `data` with RSA PKCS#1 v1.5 over SHA-1.
pub fn sign_rsa_sha1(key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
    use signature::Signer;
    let sk = rsa::pkcs1v15::SigningKey::<sha1::Sha1>::new(key.clone());
    let sig = sk
        .try_sign(data)
        .map_err(|e| Error::Crypto(format!("RSA-SHA1 signing failed: {e}")))?;
    Ok(sig.to_vec())
}

/// Verify an RSA PKCS#1 v1.5 SHA-1 signature.
pub fn verify_rsa_sha1(
    key: &rsa::RsaPublicKey,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool, Error> {
    use signature::Verifier;
    let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
        .map_err(|e| Error::Crypto(format!("invalid RSA signature encoding: {e}")))?;
    let vk = rsa::pkcs1v15::VerifyingKey::<sha1::Sha1>::new(key.clone());
    Ok(vk.verify(data, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::DecodePrivateKey;

    fn test_key() -> Option<rsa::RsaPrivateKey> {
        let pem_path = std::path::Path::new("../../test-data/keys/signer-key.pem");
        if !pem_path.exists() {
            eprintln!("skipping test: {pem_path:?} not found");
            return None;
        }
        let pem = std::fs::read_to_string(pem_path).unwrap();
        Some(rsa::RsaPrivateKey::from_pkcs8_pem(&pem).expect("parse test key"))
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let Some(key) = test_key() else { return };
        let data = b"signed info bytes";
        let sig = sign_rsa_sha1(&key, data).expect("sign");
        assert!(verify_rsa_sha1(&key.to_public_key(), data, &sig).unwrap());
        assert!(!verify_rsa_sha1(&key.to_public_key(), b"tampered", &sig).unwrap());
    }

    #[test]
    fn test_signing_is_deterministic() {
        // PKCS#1 v1.5 padding has no randomness, so two runs must agree.
        let Some(key) = test_key() else { return };
        let a = sign_rsa_sha1(&key, b"payload").unwrap();
        let b = sign_rsa_sha1(&key, b"payload").unwrap();
        assert_eq!(a, b);
    }
}
