#![forbid(unsafe_code)]

//! Transient signing-key handles.

use cryptoki::mechanism::Mechanism;
use cryptoki::object::ObjectHandle;
use cryptoki::session::Session;
use selo_core::Error;
use std::fmt;

/// A signing key acquired for one signing operation.
///
/// Software keys wrap the certificate's own RSA key. Hardware keys own
/// a logged-in PKCS#11 session that closes when the handle drops.
pub enum SigningKeyHandle {
    Software(rsa::RsaPrivateKey),
    Hardware(TokenSession),
}

/// A logged-in token session plus the located signature-key object.
pub struct TokenSession {
    session: Session,
    key: ObjectHandle,
}

impl TokenSession {
    pub(crate) fn new(session: Session, key: ObjectHandle) -> Self {
        Self { session, key }
    }
}

impl SigningKeyHandle {
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware(_))
    }

    /// Produce an RSA PKCS#1 v1.5 signature over SHA-1 of `data`.
    ///
    /// May block on physical token I/O with no bounded latency.
    pub fn sign_sha1_rsa(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            Self::Software(key) => selo_crypto::sign::sign_rsa_sha1(key, data),
            Self::Hardware(token) => token
                .session
                .sign(&Mechanism::Sha1RsaPkcs, token.key, data)
                .map_err(|e| Error::HardwareTokenFault(e.to_string())),
        }
    }
}

impl fmt::Debug for SigningKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Software(_) => write!(f, "SigningKeyHandle::Software([REDACTED])"),
            Self::Hardware(_) => write!(f, "SigningKeyHandle::Hardware(session)"),
        }
    }
}
