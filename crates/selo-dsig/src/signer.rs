#![forbid(unsafe_code)]

//! Document-level orchestration of the signing passes.

use crate::detector;
use crate::engine::{operator_recovery, SignatureEngine};
use crate::schema::SignatureRequest;
use selo_core::{Error, Result};
use selo_keys::{token, Certificate, KeyResidency, SigningKeyHandle, TokenPin};
use std::path::Path;

/// What happened to one target.
#[derive(Debug, Clone)]
pub enum TargetStatus {
    Signed {
        reference_uris: Vec<String>,
        whole_document: bool,
    },
    /// The schema left this pass disabled.
    SkippedUnset,
    /// The target already carried a signature.
    SkippedAlreadySigned,
}

#[derive(Debug, Clone)]
pub struct TargetReport {
    pub signature_tag: String,
    pub status: TargetStatus,
}

/// Per-target outcomes of one [`DocumentSigner::sign_document`] call.
#[derive(Debug, Clone, Default)]
pub struct SigningReport {
    pub targets: Vec<TargetReport>,
}

/// Drives the signing passes over a single document.
///
/// Processing is strictly in request order and stops at the first
/// unrecovered failure; targets signed before the failure stay signed —
/// there is no rollback, so a document can end up partially signed.
pub struct DocumentSigner<'a> {
    certificate: &'a Certificate,
    pin: Option<TokenPin>,
}

impl<'a> DocumentSigner<'a> {
    pub fn new(certificate: &'a Certificate) -> Self {
        Self {
            certificate,
            pin: None,
        }
    }

    /// Supply the PIN for hardware-resident keys.
    pub fn with_pin(mut self, pin: TokenPin) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Run every signing pass of `request` against the document at
    /// `path`.
    pub fn sign_document(&self, path: &Path, request: &SignatureRequest) -> Result<SigningReport> {
        let mut report = SigningReport::default();

        for target in &request.targets {
            if !target.is_set() {
                report.targets.push(TargetReport {
                    signature_tag: target.signature_tag.clone(),
                    status: TargetStatus::SkippedUnset,
                });
                continue;
            }

            if detector::is_signed(path, &target.signature_tag) {
                log::debug!(
                    "'{}' in {} is already signed, skipping",
                    target.signature_tag,
                    path.display()
                );
                report.targets.push(TargetReport {
                    signature_tag: target.signature_tag.clone(),
                    status: TargetStatus::SkippedAlreadySigned,
                });
                continue;
            }

            // A fresh key handle per signing operation; hardware
            // sessions do not survive across targets.
            let key = self.acquire_key()?;
            let outcome = SignatureEngine.sign(path, target, &key, self.certificate)?;
            report.targets.push(TargetReport {
                signature_tag: target.signature_tag.clone(),
                status: TargetStatus::Signed {
                    reference_uris: outcome.reference_uris,
                    whole_document: outcome.whole_document,
                },
            });
        }

        Ok(report)
    }

    fn acquire_key(&self) -> Result<SigningKeyHandle> {
        match self.certificate.residency() {
            KeyResidency::Hardware => {
                let provider = self.certificate.provider().ok_or_else(|| {
                    Error::Key("hardware-resident certificate has no provider configuration".into())
                })?;
                let pin = self.pin.as_ref().ok_or_else(|| {
                    Error::Key("hardware-resident certificate requires a PIN".into())
                })?;
                token::acquire_hardware_key(pin, provider).map_err(operator_recovery)
            }
            KeyResidency::Software => token::acquire_software_key(self.certificate),
        }
    }
}
