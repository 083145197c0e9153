#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) parser for the Selo XML signer.
//!
//! Supports the two encryption families found in real certificate
//! bundles: legacy PBE (SHA-1 + 3DES-CBC) and PBES2 (PBKDF2 +
//! AES-256-CBC, the OpenSSL 3.x default). The integrity MAC (SHA-1 or
//! SHA-256) is verified before anything is decrypted, so a wrong
//! password fails fast.

mod derive;
mod parse;

/// Contents extracted from a PKCS#12 blob.
#[derive(Debug)]
pub struct PfxContents {
    /// PKCS#8 DER-encoded private keys.
    pub private_keys: Vec<Vec<u8>>,
    /// DER-encoded X.509 certificates.
    pub certificates: Vec<Vec<u8>>,
}

/// Parse a PKCS#12 blob, decrypting with the given password.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<PfxContents, selo_core::Error> {
    parse::parse_pfx(data, password)
}
