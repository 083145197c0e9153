#![forbid(unsafe_code)]

/// Errors produced by the Selo XML signing library.
///
/// Structural validation failures (`MissingSignatureTag`, `MissingIdTag`)
/// are raised before any cryptographic work begins. Certificate
/// resolution failures carry an actionable message wrapping the
/// underlying cause. `HardwareTokenFault` is reserved for signing
/// failures on a removable token and carries the operator recovery
/// instruction; `Crypto` is the unclassified fallthrough for every other
/// cryptographic failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("signature tag '{0}' does not exist in the document")]
    MissingSignatureTag(String),

    #[error("id attribute tag '{0}' does not exist in the document")]
    MissingIdTag(String),

    #[error("certificate not found in store, serial number: {0}")]
    CertificateNotFound(String),

    #[error("failed to access digital certificate: {0}")]
    CertificateAccess(String),

    #[error("hardware token fault: {0}")]
    HardwareTokenFault(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
