#![forbid(unsafe_code)]

//! Token PIN held in a wipable buffer.

use selo_core::Error;
use std::fmt;
use zeroize::Zeroizing;

/// A hardware-token PIN.
///
/// The bytes live in a zeroize-on-drop buffer and never appear in
/// `Debug` output. The transient login credential built from this value
/// is wiped immediately after the token session is established.
#[derive(Clone)]
pub struct TokenPin(Zeroizing<Vec<u8>>);

impl TokenPin {
    pub fn new(pin: impl Into<Vec<u8>>) -> Result<Self, Error> {
        let bytes = pin.into();
        if bytes.is_empty() {
            return Err(Error::Key("token PIN must not be empty".into()));
        }
        Ok(Self(Zeroizing::new(bytes)))
    }

    pub fn from_str(pin: &str) -> Result<Self, Error> {
        Self::new(pin.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The PIN as UTF-8 text, as required by the PKCS#11 login call.
    pub fn as_str(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.0).map_err(|_| Error::Key("token PIN is not valid UTF-8".into()))
    }
}

impl fmt::Debug for TokenPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenPin([REDACTED])")
    }
}
