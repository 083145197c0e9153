#![forbid(unsafe_code)]

//! Certificate resolution from a PKCS#12 blob with an on-disk cache.
//!
//! The cache directory is injected and cache entries are keyed by the
//! blob's content hash, so identical blobs resolve to the same file and
//! caching stays independent of process state. The entry is compared
//! byte-for-byte before any rewrite; a stale or truncated entry is
//! replaced, an identical one is left untouched.

use crate::certificate::Certificate;
use selo_core::Error;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Resolve a certificate from PKCS#12 bytes, caching the blob under
/// `cache_dir`.
pub fn resolve_from_bytes(
    blob: &[u8],
    password: &str,
    cache_dir: &Path,
) -> Result<Certificate, Error> {
    if blob.is_empty() {
        return Err(Error::CertificateAccess("empty certificate blob".into()));
    }

    let path = ensure_cached(blob, cache_dir)?;

    // Always load from the (possibly just-written) cache file.
    let data = std::fs::read(&path)
        .map_err(|e| Error::CertificateAccess(format!("cannot read {}: {e}", path.display())))?;

    load_pkcs12_certificate(&data, password)
}

/// The cache file path a blob resolves to.
pub fn cache_path(blob: &[u8], cache_dir: &Path) -> PathBuf {
    let digest = Sha256::digest(blob);
    let key: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    cache_dir.join(format!("{key}.p12"))
}

/// Write the blob into the cache unless an identical entry exists.
fn ensure_cached(blob: &[u8], cache_dir: &Path) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(cache_dir).map_err(|e| {
        Error::CertificateAccess(format!(
            "cannot create certificate cache {}: {e}",
            cache_dir.display()
        ))
    })?;

    let path = cache_path(blob, cache_dir);
    match std::fs::read(&path) {
        Ok(existing) if existing == blob => {
            log::debug!("certificate cache hit: {}", path.display());
        }
        Ok(_) => {
            log::warn!(
                "certificate cache entry {} differs from blob, rewriting",
                path.display()
            );
            write_cache(&path, blob)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_cache(&path, blob)?;
        }
        Err(e) => {
            return Err(Error::CertificateAccess(format!(
                "cannot read certificate cache {}: {e}",
                path.display()
            )));
        }
    }
    Ok(path)
}

fn write_cache(path: &Path, blob: &[u8]) -> Result<(), Error> {
    std::fs::write(path, blob).map_err(|e| {
        Error::CertificateAccess(format!("cannot write certificate cache {}: {e}", path.display()))
    })
}

/// Load the certificate and its RSA key from PKCS#12 bytes.
fn load_pkcs12_certificate(data: &[u8], password: &str) -> Result<Certificate, Error> {
    use pkcs8::DecodePrivateKey;

    let contents = selo_pkcs12::parse_pkcs12(data, password)
        .map_err(|e| Error::CertificateAccess(e.to_string()))?;

    let key_der = contents
        .private_keys
        .first()
        .ok_or_else(|| Error::CertificateAccess("PKCS#12 blob contains no private key".into()))?;
    let key = rsa::RsaPrivateKey::from_pkcs8_der(key_der)
        .map_err(|e| Error::CertificateAccess(format!("failed to parse RSA private key: {e}")))?;

    if contents.certificates.is_empty() {
        return Err(Error::CertificateAccess(
            "PKCS#12 blob contains no certificate".into(),
        ));
    }

    // Pick the certificate matching the private key; a bundle may also
    // carry chain certificates.
    let public = key.to_public_key();
    let mut chosen: Option<Certificate> = None;
    for der in &contents.certificates {
        let cert = Certificate::from_der(der.clone())?;
        if chosen.is_none() {
            chosen = Some(cert);
        } else if cert
            .rsa_public_key()
            .map(|pk| pk == public)
            .unwrap_or(false)
        {
            chosen = Some(cert);
            break;
        }
    }
    let cert = chosen.expect("certificates checked non-empty above");

    Ok(cert.with_private_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p12_fixture() -> Option<Vec<u8>> {
        let path = std::path::Path::new("../../test-data/keys/signer.p12");
        if !path.exists() {
            eprintln!("skipping test: {path:?} not found");
            return None;
        }
        Some(std::fs::read(path).unwrap())
    }

    #[test]
    fn test_resolve_from_bytes() {
        let Some(blob) = p12_fixture() else { return };
        let cache = tempfile::tempdir().unwrap();
        let cert = resolve_from_bytes(&blob, "secret123", cache.path()).expect("resolve");
        assert_eq!(cert.serial(), "4a1b2c3d4e5f");
        assert!(cert.private_key().is_some());
    }

    #[test]
    fn test_wrong_password_is_access_error() {
        let Some(blob) = p12_fixture() else { return };
        let cache = tempfile::tempdir().unwrap();
        let err = resolve_from_bytes(&blob, "nope", cache.path()).unwrap_err();
        assert!(matches!(err, Error::CertificateAccess(_)));
    }

    #[test]
    fn test_identical_blob_does_not_rewrite_cache() {
        let Some(blob) = p12_fixture() else { return };
        let cache = tempfile::tempdir().unwrap();

        resolve_from_bytes(&blob, "secret123", cache.path()).unwrap();
        let path = cache_path(&blob, cache.path());
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        resolve_from_bytes(&blob, "secret123", cache.path()).unwrap();
        let after = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(before, after, "identical blob must not rewrite the cache");
        assert_eq!(std::fs::read(&path).unwrap(), blob);
    }

    #[test]
    fn test_corrupted_cache_entry_is_rewritten() {
        let Some(blob) = p12_fixture() else { return };
        let cache = tempfile::tempdir().unwrap();

        let path = cache_path(&blob, cache.path());
        std::fs::create_dir_all(cache.path()).unwrap();
        std::fs::write(&path, b"truncated garbage").unwrap();

        let cert = resolve_from_bytes(&blob, "secret123", cache.path()).expect("resolve");
        assert_eq!(cert.serial(), "4a1b2c3d4e5f");
        assert_eq!(
            std::fs::read(&path).unwrap(),
            blob,
            "corrupt entry must be replaced by the blob"
        );
    }

    #[test]
    fn test_differing_blobs_get_distinct_entries() {
        let Some(blob) = p12_fixture() else { return };
        let cache = tempfile::tempdir().unwrap();

        resolve_from_bytes(&blob, "secret123", cache.path()).unwrap();
        let mut other = blob.clone();
        other.push(0x00);
        assert_ne!(cache_path(&blob, cache.path()), cache_path(&other, cache.path()));
    }

    #[test]
    fn test_empty_blob_rejected() {
        let cache = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_from_bytes(&[], "pw", cache.path()),
            Err(Error::CertificateAccess(_))
        ));
    }
}
