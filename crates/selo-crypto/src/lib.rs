#![forbid(unsafe_code)]

//! Cryptographic primitives for the Selo XML signer.
//!
//! The signature format is fixed: SHA-1 reference digests and RSA
//! PKCS#1 v1.5 signatures over SHA-1 (the `rsa-sha1` signature method).
//! There is no algorithm registry because negotiation is out of scope.

pub mod digest;
pub mod sign;
