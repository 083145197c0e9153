#![forbid(unsafe_code)]

//! The resolved certificate model.

use der::{Decode, Encode};
use selo_core::Error;
use std::path::PathBuf;
use x509_cert::Certificate as X509Certificate;

/// Where the private key behind a certificate lives.
///
/// Populated once at resolution time; the signer never re-probes at
/// signing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResidency {
    /// Key material is carried with the certificate.
    Software,
    /// Key lives on a removable hardware token and requires a PIN-gated
    /// session per signing operation.
    Hardware,
}

/// PKCS#11 provider coordinates for a hardware-resident key.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    /// Path to the PKCS#11 module library.
    pub module_path: PathBuf,
    /// Token label to select among present tokens; first token wins when
    /// unset.
    pub token_label: Option<String>,
    /// CKA_LABEL of the signature key object; first signing-capable
    /// private key wins when unset.
    pub key_label: Option<String>,
}

/// A resolved X.509 certificate bound to its private-key reference.
///
/// Immutable once resolved; owned by the caller for the signing
/// session's duration and reusable across documents.
pub struct Certificate {
    der: Vec<u8>,
    serial: String,
    subject: String,
    private_key: Option<rsa::RsaPrivateKey>,
    residency: KeyResidency,
    provider: Option<TokenProvider>,
}

impl Certificate {
    /// Parse a certificate from DER bytes. The result is
    /// software-resident with no bound key until told otherwise.
    pub fn from_der(der: Vec<u8>) -> Result<Self, Error> {
        let parsed = X509Certificate::from_der(&der)
            .map_err(|e| Error::CertificateAccess(format!("invalid X.509 certificate: {e}")))?;
        let serial = serial_hex(parsed.tbs_certificate.serial_number.as_bytes());
        let subject = parsed.tbs_certificate.subject.to_string();
        Ok(Self {
            der,
            serial,
            subject,
            private_key: None,
            residency: KeyResidency::Software,
            provider: None,
        })
    }

    /// Bind a software-resident private key.
    pub fn with_private_key(mut self, key: rsa::RsaPrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Record the hardware provider and the residency the probe reported.
    pub fn with_provider(mut self, provider: TokenProvider, residency: KeyResidency) -> Self {
        self.provider = Some(provider);
        self.residency = residency;
        self
    }

    /// Raw DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Normalized lowercase-hex serial number.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn residency(&self) -> KeyResidency {
        self.residency
    }

    pub fn private_key(&self) -> Option<&rsa::RsaPrivateKey> {
        self.private_key.as_ref()
    }

    pub fn provider(&self) -> Option<&TokenProvider> {
        self.provider.as_ref()
    }

    /// Case-insensitive serial comparison after normalization.
    pub fn serial_matches(&self, serial: &str) -> bool {
        let wanted = normalize_serial(serial);
        !wanted.is_empty() && self.serial == wanted
    }

    /// The RSA public key from the certificate's SPKI.
    pub fn rsa_public_key(&self) -> Result<rsa::RsaPublicKey, Error> {
        use spki::DecodePublicKey;
        let parsed = X509Certificate::from_der(&self.der)
            .map_err(|e| Error::CertificateAccess(format!("invalid X.509 certificate: {e}")))?;
        let spki_der = parsed
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::CertificateAccess(format!("failed to encode SPKI: {e}")))?;
        rsa::RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| Error::Key(format!("certificate does not carry an RSA key: {e}")))
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("serial", &self.serial)
            .field("subject", &self.subject)
            .field("residency", &self.residency)
            .field("has_private_key", &self.private_key.is_some())
            .finish()
    }
}

/// Lowercase hex of a serial's big-endian bytes, without the DER sign
/// padding or leading zeros.
fn serial_hex(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Normalize a user-supplied serial: drop separators and whitespace,
/// lowercase, strip leading zeros.
pub fn normalize_serial(serial: &str) -> String {
    let cleaned: String = serial
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect::<String>()
        .to_lowercase();
    let trimmed = cleaned.trim_start_matches('0');
    if trimmed.is_empty() && !cleaned.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_serial() {
        assert_eq!(normalize_serial("4A:1B:2C:3D:4E:5F"), "4a1b2c3d4e5f");
        assert_eq!(normalize_serial(" 4a1b2c3d4e5f "), "4a1b2c3d4e5f");
        assert_eq!(normalize_serial("004a1b"), "4a1b");
        assert_eq!(normalize_serial("0000"), "0");
        assert_eq!(normalize_serial(""), "");
    }

    #[test]
    fn test_serial_hex_strips_sign_padding() {
        assert_eq!(serial_hex(&[0x00, 0xff, 0x01]), "ff01");
        assert_eq!(serial_hex(&[0x4a, 0x1b]), "4a1b");
        assert_eq!(serial_hex(&[0x00]), "0");
    }

    #[test]
    fn test_from_der_fixture() {
        let der_path = std::path::Path::new("../../test-data/keys/signer-cert.der");
        if !der_path.exists() {
            eprintln!("skipping test: {der_path:?} not found");
            return;
        }
        let der = std::fs::read(der_path).unwrap();
        let cert = Certificate::from_der(der).expect("parse certificate");
        assert_eq!(cert.serial(), "4a1b2c3d4e5f");
        assert!(cert.serial_matches("4A1B2C3D4E5F"));
        assert!(cert.serial_matches("4a:1b:2c:3d:4e:5f"));
        assert!(!cert.serial_matches("deadbeef"));
        assert!(cert.subject().contains("selo-test-signer"));
        assert_eq!(cert.residency(), KeyResidency::Software);
        assert!(cert.private_key().is_none());
        assert!(cert.rsa_public_key().is_ok());
    }

    #[test]
    fn test_from_der_rejects_garbage() {
        assert!(Certificate::from_der(vec![0x30, 0x00]).is_err());
    }
}
