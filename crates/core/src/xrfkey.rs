//! Anti-CSRF key (`xrfkey`)

use std::fmt;
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use senserest_domain::constants::XRFKEY_LENGTH;
use senserest_domain::{RestError, Result};

/// A validated anti-CSRF key: exactly 16 ASCII letters or digits
///
/// The same value is sent as the `xrfkey` query parameter and as the
/// `X-Qlik-Xrfkey` header; the service rejects the call if they differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xrfkey(String);

impl Xrfkey {
    /// Validate a caller-supplied key
    ///
    /// # Errors
    ///
    /// Returns [`RestError::InvalidArgument`] unless the key is exactly 16
    /// alphanumeric characters.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let length = key.chars().count();
        if length != XRFKEY_LENGTH {
            return Err(RestError::InvalidArgument(format!(
                "xrfkey must be exactly {XRFKEY_LENGTH} characters, got {length}"
            )));
        }
        if !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(RestError::InvalidArgument(
                "xrfkey may only contain the characters 0-9, a-z and A-Z".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Fresh key from the operating system CSPRNG
    #[must_use]
    pub fn generate() -> Self {
        let key: String =
            OsRng.sample_iter(&Alphanumeric).take(XRFKEY_LENGTH).map(char::from).collect();
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Xrfkey {
    type Err = RestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Xrfkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sixteen_alphanumerics_verbatim() {
        let key = Xrfkey::new("ABCDEFGHijkl0123").unwrap();
        assert_eq!(key.as_str(), "ABCDEFGHijkl0123");
    }

    #[test]
    fn rejects_wrong_length() {
        for bad in ["", "short", "ABCDEFGHijkl01234"] {
            let err = Xrfkey::new(bad).unwrap_err();
            assert!(matches!(err, RestError::InvalidArgument(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn rejects_punctuation() {
        let err = "ABCDEFGHijkl012!".parse::<Xrfkey>().unwrap_err();
        assert!(matches!(err, RestError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_multibyte_characters() {
        assert!(Xrfkey::new("ABCDEFGHijkl012é").is_err());
    }

    #[test]
    fn generated_keys_are_valid_and_distinct() {
        let a = Xrfkey::generate();
        let b = Xrfkey::generate();
        assert!(Xrfkey::new(a.as_str()).is_ok());
        assert_ne!(a, b);
    }
}
