use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Wrapper for sensitive string data that zeroes its memory on drop.
///
/// Credentials held by a [`Session`](super::Session) (passwords, token values)
/// are wrapped in this type so that they are cleared from memory when no
/// longer needed, and so that `Debug`/`Display` output can never leak them.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    /// Creates a new secret string from the provided value.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Returns a reference to the inner string value.
    ///
    /// # Security Note
    /// The returned reference should not be stored for extended periods
    /// to minimize exposure time of sensitive data.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the secret and returns the inner String.
    ///
    /// # Security Note
    /// The caller becomes responsible for the secure handling of the returned String.
    pub fn into_string(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    /// Masks the value for display purposes.
    fn mask_sensitive(value: &str) -> String {
        if value.len() <= 8 {
            "***".to_string()
        } else {
            format!("{}...{}", &value[..4], &value[value.len() - 4..])
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretString")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::mask_sensitive(&self.0))
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_reveals_value() {
        let secret = SecretString::new("secret-password".to_string());
        let debug_str = format!("{secret:?}");
        assert_eq!(debug_str, "SecretString { value: \"[REDACTED]\" }");
        assert!(!debug_str.contains("secret-password"));
    }

    #[test]
    fn test_display_masks_value() {
        let secret = SecretString::new("secret-password-12345".to_string());
        assert_eq!(format!("{secret}"), "secr...2345");

        let short = SecretString::new("short".to_string());
        assert_eq!(format!("{short}"), "***");
    }

    #[test]
    fn test_conversions() {
        let secret: SecretString = "test".into();
        assert_eq!(secret.as_str(), "test");

        let secret = SecretString::new("test".to_string());
        assert_eq!(secret.into_string(), "test");
    }
}
