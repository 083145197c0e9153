#![forbid(unsafe_code)]

//! Hardware-token access through PKCS#11.
//!
//! The provider configuration names the PKCS#11 module and token; a
//! signing session is opened read-only, logged in with the programmatic
//! PIN (never an interactive prompt), and closed when the handle drops.

use crate::certificate::{Certificate, KeyResidency, TokenProvider};
use crate::handle::{SigningKeyHandle, TokenSession};
use crate::pin::TokenPin;
use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::object::{Attribute, ObjectClass};
use cryptoki::session::UserType;
use cryptoki::slot::Slot;
use cryptoki::types::AuthPin;
use selo_core::Error;

/// Classify the key residency behind a provider configuration.
///
/// `Hardware` iff the slot reports a removable, hardware-resident key
/// container. Any probe failure deliberately falls open to `Software`
/// rather than propagating — resolution must not die because a token
/// is momentarily absent; the mistake surfaces at signing time instead.
pub fn classify(provider: &TokenProvider) -> KeyResidency {
    match probe_slot(provider) {
        Ok(residency) => residency,
        Err(e) => {
            log::warn!("token probe failed, assuming software-resident key: {e}");
            KeyResidency::Software
        }
    }
}

fn probe_slot(provider: &TokenProvider) -> Result<KeyResidency, Error> {
    let ctx = open_module(provider)?;
    let slot = find_slot(&ctx, provider)?;
    let info = ctx
        .get_slot_info(slot)
        .map_err(|e| Error::HardwareTokenFault(format!("slot info: {e}")))?;

    if info.hardware_slot() && info.removable_device() {
        Ok(KeyResidency::Hardware)
    } else {
        Ok(KeyResidency::Software)
    }
}

/// Open a PIN-gated signing session and locate the signature key.
///
/// The transient login credential is wiped as soon as `login` returns;
/// no key material is persisted by the provider — only a session handle
/// is held, and it closes on drop.
pub fn acquire_hardware_key(
    pin: &TokenPin,
    provider: &TokenProvider,
) -> Result<SigningKeyHandle, Error> {
    let ctx = open_module(provider)?;
    let slot = find_slot(&ctx, provider)?;

    let session = ctx
        .open_ro_session(slot)
        .map_err(|e| Error::HardwareTokenFault(format!("cannot open token session: {e}")))?;

    {
        // Scope the login credential so it is zeroized immediately after
        // the session is established.
        let auth = AuthPin::new(pin.as_str()?.to_owned());
        session
            .login(UserType::User, Some(&auth))
            .map_err(|e| Error::HardwareTokenFault(format!("PIN login failed: {e}")))?;
    }
    log::info!("token session established");

    let mut template = vec![
        Attribute::Class(ObjectClass::PRIVATE_KEY),
        Attribute::Sign(true),
    ];
    if let Some(label) = &provider.key_label {
        template.push(Attribute::Label(label.as_bytes().to_vec()));
    }

    let keys = session
        .find_objects(&template)
        .map_err(|e| Error::HardwareTokenFault(format!("key lookup failed: {e}")))?;
    let key = keys
        .first()
        .copied()
        .ok_or_else(|| Error::HardwareTokenFault("no signature key found on token".into()))?;

    Ok(SigningKeyHandle::Hardware(TokenSession::new(session, key)))
}

/// Wrap the certificate's own bound private key; no session semantics.
pub fn acquire_software_key(certificate: &Certificate) -> Result<SigningKeyHandle, Error> {
    certificate
        .private_key()
        .cloned()
        .map(SigningKeyHandle::Software)
        .ok_or_else(|| {
            Error::Key(format!(
                "certificate {} carries no software private key",
                certificate.serial()
            ))
        })
}

fn open_module(provider: &TokenProvider) -> Result<Pkcs11, Error> {
    let ctx = Pkcs11::new(&provider.module_path).map_err(|e| {
        Error::HardwareTokenFault(format!(
            "cannot load PKCS#11 module {}: {e}",
            provider.module_path.display()
        ))
    })?;
    match ctx.initialize(CInitializeArgs::OsThreads) {
        Ok(()) => {}
        Err(cryptoki::error::Error::AlreadyInitialized) => {}
        Err(e) => {
            return Err(Error::HardwareTokenFault(format!(
                "PKCS#11 initialization failed: {e}"
            )))
        }
    }
    Ok(ctx)
}

fn find_slot(ctx: &Pkcs11, provider: &TokenProvider) -> Result<Slot, Error> {
    let slots = ctx
        .get_slots_with_token()
        .map_err(|e| Error::HardwareTokenFault(format!("slot enumeration failed: {e}")))?;

    for slot in slots {
        match &provider.token_label {
            None => return Ok(slot),
            Some(label) => {
                let info = ctx
                    .get_token_info(slot)
                    .map_err(|e| Error::HardwareTokenFault(format!("token info: {e}")))?;
                if info.label().trim() == label.trim() {
                    return Ok(slot);
                }
            }
        }
    }

    Err(Error::HardwareTokenFault(
        "no matching token is present".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn absent_provider() -> TokenProvider {
        TokenProvider {
            module_path: PathBuf::from("/nonexistent/pkcs11-module.so"),
            token_label: None,
            key_label: None,
        }
    }

    #[test]
    fn test_classify_fails_open_to_software() {
        // No module present: the probe must not propagate the failure.
        assert_eq!(classify(&absent_provider()), KeyResidency::Software);
    }

    #[test]
    fn test_acquire_hardware_key_reports_fault() {
        let pin = TokenPin::from_str("123456").unwrap();
        let err = acquire_hardware_key(&pin, &absent_provider()).unwrap_err();
        assert!(matches!(err, Error::HardwareTokenFault(_)));
    }

    #[test]
    fn test_acquire_software_key_requires_bound_key() {
        let der_path = std::path::Path::new("../../test-data/keys/signer-cert.der");
        if !der_path.exists() {
            eprintln!("skipping test: {der_path:?} not found");
            return;
        }
        let cert = Certificate::from_der(std::fs::read(der_path).unwrap()).unwrap();
        // No key bound: acquisition must fail, not fall back.
        assert!(matches!(
            acquire_software_key(&cert),
            Err(Error::Key(_))
        ));
    }
}
