//! Sensitive string values.
//!
//! [`Secret`] wraps a credential so that `Display`, `Debug` and `Serialize`
//! all render [`MASK`] instead of the value. The only way back to the raw
//! string is [`Secret::reveal`].

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

/// Token rendered in place of every secret value.
pub const MASK: &str = "**********";

/// A sensitive string that never renders its contents.
///
/// # Example
///
/// ```
/// use orgair_config::{Secret, MASK};
///
/// let key = Secret::new("sk-live-0123456789");
/// assert_eq!(key.to_string(), MASK);
/// assert_eq!(format!("{key:?}"), format!("Secret({MASK})"));
/// assert_eq!(key.reveal(), "sk-live-0123456789");
/// ```
pub struct Secret {
    inner: SecretString,
}

impl Secret {
    /// Wrap a raw value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(raw.into()),
        }
    }

    /// Return the raw value.
    ///
    /// Callers that hand the credential to a connection layer are the only
    /// legitimate users of this method.
    pub fn reveal(&self) -> &str {
        self.inner.expose_secret()
    }

    /// Length of the raw value in characters.
    pub fn len(&self) -> usize {
        self.reveal().chars().count()
    }

    /// Whether the raw value is empty.
    pub fn is_empty(&self) -> bool {
        self.reveal().is_empty()
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self::new(self.reveal())
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.reveal() == other.reveal()
    }
}

impl Eq for Secret {}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({MASK})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_is_masked() {
        let secret = Secret::new("hunter2");
        assert_eq!(secret.to_string(), MASK);
    }

    #[test]
    fn test_debug_is_masked() {
        let secret = Secret::new("hunter2");
        let rendered = format!("{secret:?} {secret:#?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_serialize_is_masked() {
        let secret = Secret::new("hunter2");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, format!("\"{MASK}\""));
    }

    #[test]
    fn test_reveal_returns_raw() {
        let secret = Secret::new("sk-abc");
        assert_eq!(secret.reveal(), "sk-abc");
        assert_eq!(secret.len(), 6);
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_clone_and_eq() {
        let secret = Secret::new("abc");
        assert_eq!(secret.clone(), secret);
        assert_ne!(secret, Secret::new("abd"));
    }

    #[test]
    fn test_len_counts_characters() {
        assert_eq!(Secret::new("ключ").len(), 4);
    }

    #[test]
    fn test_values_inside_the_mask_are_indistinguishable() {
        // A raw value that is itself a substring of the rendering cannot be
        // told apart from it.
        let secret = Secret::new("***");
        assert!(secret.to_string().contains(secret.reveal()));
        assert_eq!(secret.to_string(), Secret::new("other").to_string());
    }

    proptest! {
        // Excludes `*` and short strings, which can occur inside
        // `Secret(**********)` regardless of the wrapped value.
        #[test]
        fn prop_rendering_never_contains_raw(raw in "[a-zA-Z0-9_\\-]{7,64}") {
            let secret = Secret::new(raw.clone());
            let display = secret.to_string();
            let debug = format!("{secret:?}");
            let json = serde_json::to_string(&secret).unwrap();
            prop_assert!(!display.contains(&raw));
            prop_assert!(!debug.contains(&raw));
            prop_assert!(!json.contains(&raw));
        }
    }
}
