use derive_more::Display;
use thiserror::Error;

use crate::StorePrefix;

/// A store key.
///
/// A key is a `/` separated path that does not start or end with `/` and has no empty components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct StoreKey(String);

/// A list of [`StoreKey`].
pub type StoreKeys = Vec<StoreKey>;

/// An invalid store key.
#[derive(Debug, Clone, Error)]
#[error("invalid store key {0}")]
pub struct StoreKeyError(String);

impl From<&str> for StoreKeyError {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl StoreKey {
    /// Create a new store key from `key`.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if `key` is not valid according to [`StoreKey::validate()`].
    pub fn new(key: impl Into<String>) -> Result<Self, StoreKeyError> {
        let key = key.into();
        if Self::validate(&key) {
            Ok(Self(key))
        } else {
            Err(StoreKeyError(key))
        }
    }

    /// Create a new store key from `key` without validation.
    ///
    /// `key` is not validated, so this can result in an invalid store key.
    #[must_use]
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        let key = key.into();
        debug_assert!(Self::validate(&key));
        Self(key)
    }

    /// Extracts a string slice containing the key `String`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a key.
    #[must_use]
    pub fn validate(key: &str) -> bool {
        !key.is_empty() && key.split('/').all(|component| !component.is_empty())
    }

    /// The final component of the key.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Returns true if the key has prefix `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &StorePrefix) -> bool {
        self.0.starts_with(prefix.as_str())
    }

    /// Returns the parent of this key.
    #[must_use]
    pub fn parent(&self) -> StorePrefix {
        match self.0.rsplit_once('/') {
            // a valid key has no empty components, so its parent is a valid prefix
            Some((parent, _)) => StorePrefix::new_unchecked(format!("{parent}/")),
            None => StorePrefix::root(),
        }
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = StoreKeyError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_key() {
        assert!(StoreKey::new("a").is_ok());
        assert!(StoreKey::new("a/b/c.tdb").is_ok());
        assert!(StoreKey::new("").is_err());
        assert!(StoreKey::new("/a").is_err());
        assert!(StoreKey::new("a/").is_err());
        assert!(StoreKey::new("a//b").is_err());
    }

    #[test]
    fn store_key_parent() {
        let key = StoreKey::new("array/__1_2_0/a.tdb").unwrap();
        assert_eq!(key.parent().as_str(), "array/__1_2_0/");
        assert_eq!(key.name(), "a.tdb");
        assert!(key.has_prefix(&StorePrefix::new("array/").unwrap()));
        assert!(!key.has_prefix(&StorePrefix::new("b/").unwrap()));
        assert_eq!(StoreKey::new("a").unwrap().parent(), StorePrefix::root());
    }
}
