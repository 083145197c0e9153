#![forbid(unsafe_code)]

//! Personal certificate store backed by a directory.
//!
//! The store directory holds PEM files (a CERTIFICATE block, optionally
//! followed by a PRIVATE KEY block for software-resident keys) and bare
//! DER certificates. Lookup is by serial number, case-insensitive after
//! normalization. The directory is only ever opened read-only and the
//! handle is scoped to the lookup call.

use crate::certificate::{normalize_serial, Certificate};
use selo_core::Error;
use std::path::{Path, PathBuf};

/// A read-only view over the personal certificate store directory.
pub struct CertStore {
    dir: PathBuf,
}

impl CertStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Find a certificate by serial number.
    ///
    /// Scans the store in file-name order and returns the first match.
    /// Unreadable or foreign files are skipped — one broken file must
    /// not take the whole store down.
    pub fn resolve_by_serial(&self, serial: &str) -> Result<Certificate, Error> {
        let wanted = normalize_serial(serial);
        if wanted.is_empty() {
            return Err(Error::CertificateNotFound(serial.trim().to_owned()));
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| {
                Error::CertificateAccess(format!(
                    "cannot open certificate store {}: {e}",
                    self.dir.display()
                ))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        for path in entries {
            match load_store_file(&path) {
                Ok(Some(cert)) => {
                    if cert.serial_matches(serial) {
                        log::debug!(
                            "resolved certificate serial {} from {}",
                            cert.serial(),
                            path.display()
                        );
                        return Ok(cert);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!("skipping store file {}: {e}", path.display());
                }
            }
        }

        Err(Error::CertificateNotFound(serial.trim().to_owned()))
    }
}

/// Load one store file: PEM bundle or DER certificate. Returns `None`
/// for file types the store does not recognize.
fn load_store_file(path: &Path) -> Result<Option<Certificate>, Error> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !matches!(ext.as_str(), "pem" | "crt" | "cer" | "der") {
        return Ok(None);
    }

    let data = std::fs::read(path)?;
    if data.starts_with(b"-----BEGIN") {
        let text = std::str::from_utf8(&data)
            .map_err(|e| Error::CertificateAccess(format!("store file is not UTF-8: {e}")))?;
        return load_pem_bundle(text).map(Some);
    }
    Certificate::from_der(data).map(Some)
}

/// Parse a PEM bundle: the first CERTIFICATE block becomes the
/// certificate, a PRIVATE KEY block (if present) its bound RSA key.
fn load_pem_bundle(text: &str) -> Result<Certificate, Error> {
    let mut cert_der: Option<Vec<u8>> = None;
    let mut key_der: Option<Vec<u8>> = None;

    for block in pem_blocks(text) {
        let (label, der) = pem_rfc7468::decode_vec(block.as_bytes())
            .map_err(|e| Error::CertificateAccess(format!("invalid PEM block: {e}")))?;
        match label {
            "CERTIFICATE" if cert_der.is_none() => cert_der = Some(der),
            "PRIVATE KEY" if key_der.is_none() => key_der = Some(der),
            _ => {}
        }
    }

    let cert_der =
        cert_der.ok_or_else(|| Error::CertificateAccess("no CERTIFICATE block in file".into()))?;
    let mut cert = Certificate::from_der(cert_der)?;

    if let Some(der) = key_der {
        use pkcs8::DecodePrivateKey;
        let key = rsa::RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| Error::Key(format!("failed to parse RSA private key: {e}")))?;
        cert = cert.with_private_key(key);
    }

    Ok(cert)
}

/// Split a text file into its PEM blocks.
fn pem_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(start_off) = text[pos..].find("-----BEGIN") {
        let start = pos + start_off;
        let Some(end_marker) = text[start..].find("-----END") else {
            break;
        };
        let after_end = start + end_marker;
        // The block runs through the end of the "-----END LABEL-----" line.
        let block_end = match text[after_end..].find('\n') {
            Some(nl) => after_end + nl + 1,
            None => text.len(),
        };
        blocks.push(text[start..block_end].trim_end());
        pos = block_end;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_dir() -> Option<PathBuf> {
        let dir = PathBuf::from("../../test-data/store");
        if !dir.exists() {
            eprintln!("skipping test: {dir:?} not found");
            return None;
        }
        Some(dir)
    }

    #[test]
    fn test_resolve_by_serial() {
        let Some(dir) = store_dir() else { return };
        let store = CertStore::open(dir);
        let cert = store.resolve_by_serial("4a1b2c3d4e5f").expect("resolve");
        assert_eq!(cert.serial(), "4a1b2c3d4e5f");
        // The store bundle carries the key, so the certificate is usable
        // for software signing.
        assert!(cert.private_key().is_some());
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let Some(dir) = store_dir() else { return };
        let store = CertStore::open(dir);
        assert!(store.resolve_by_serial("4A1B2C3D4E5F").is_ok());
        assert!(store.resolve_by_serial(" 4A:1B:2C:3D:4E:5F ").is_ok());
    }

    #[test]
    fn test_resolve_other_identity() {
        let Some(dir) = store_dir() else { return };
        let store = CertStore::open(dir);
        let cert = store.resolve_by_serial("FF01").expect("resolve other");
        assert_eq!(cert.serial(), "ff01");
        // Certificate-only file: no bound key.
        assert!(cert.private_key().is_none());
    }

    #[test]
    fn test_resolve_missing_serial() {
        let Some(dir) = store_dir() else { return };
        let store = CertStore::open(dir);
        let err = store.resolve_by_serial("deadbeef").unwrap_err();
        assert!(matches!(err, Error::CertificateNotFound(_)));
    }

    #[test]
    fn test_missing_store_dir_is_access_error() {
        let store = CertStore::open("/nonexistent/selo-store");
        let err = store.resolve_by_serial("4a1b").unwrap_err();
        assert!(matches!(err, Error::CertificateAccess(_)));
    }

    #[test]
    fn test_pem_blocks_split() {
        let text = "-----BEGIN A-----\nZm9v\n-----END A-----\n-----BEGIN B-----\nYmFy\n-----END B-----\n";
        let blocks = pem_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("BEGIN A"));
        assert!(blocks[1].contains("BEGIN B"));
    }
}
