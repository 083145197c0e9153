#![forbid(unsafe_code)]

//! Enveloped XML-DSig signature creation for the Selo XML signer.
//!
//! The engine produces standards-form enveloped signatures (SHA-1
//! digest, RSA-SHA1, inclusive C14N 1.0, KeyInfo carrying the
//! certificate) over schema-designated elements, embedding each
//! signature as the last child of its signature-tag element. The
//! document signer orchestrates the per-target passes and skips targets
//! that are unset or already signed.

pub mod detector;
pub mod engine;
pub mod schema;
pub mod signer;
mod template;

pub use engine::{SignatureEngine, SignedOutcome};
pub use schema::{SchemaTags, SignatureRequest, SignatureTarget};
pub use signer::{DocumentSigner, SigningReport, TargetReport, TargetStatus};
