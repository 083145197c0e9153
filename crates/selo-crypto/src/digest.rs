#![forbid(unsafe_code)]

//! Reference digest computation.

use selo_core::{algorithm, Error};
use sha1::{Digest, Sha1};

/// Compute a SHA-1 digest in one shot.
pub fn sha1(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    Digest::update(&mut hasher, data);
    Digest::finalize(hasher).to_vec()
}

/// Compute a digest for the given algorithm URI.
///
/// Only `xmldsig#sha1` is emitted by this engine; anything else is
/// rejected here rather than silently substituted.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    match uri {
        algorithm::SHA1 => Ok(sha1(data)),
        _ => Err(Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}"))),
    }
}
