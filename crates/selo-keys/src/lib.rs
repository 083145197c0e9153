#![forbid(unsafe_code)]

//! Certificate resolution and signing-key acquisition for the Selo XML
//! signer.
//!
//! Certificates come from one of two places: a personal-store directory
//! searched by serial number, or a PKCS#12 blob kept in a
//! content-addressed on-disk cache. The private key behind a resolved
//! certificate is either software-resident (carried with the
//! certificate) or hardware-resident on a removable PKCS#11 token,
//! reached through a PIN-gated session.

pub mod certificate;
pub mod handle;
pub mod pin;
pub mod resolver;
pub mod store;
pub mod token;

pub use certificate::{Certificate, KeyResidency, TokenProvider};
pub use handle::SigningKeyHandle;
pub use pin::TokenPin;
pub use store::CertStore;
