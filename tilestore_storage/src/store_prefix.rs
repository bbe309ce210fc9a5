use derive_more::Display;
use thiserror::Error;

use crate::{StoreKey, StoreKeyError};

/// A store prefix.
///
/// A prefix is either empty (the root) or a `/` separated path ending in `/` with no empty components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct StorePrefix(String);

/// A list of [`StorePrefix`].
pub type StorePrefixes = Vec<StorePrefix>;

/// An invalid store prefix.
#[derive(Debug, Clone, Error)]
#[error("invalid store prefix {0}")]
pub struct StorePrefixError(String);

impl StorePrefixError {
    /// Create a new invalid store prefix error.
    #[must_use]
    pub fn new(prefix: String) -> Self {
        Self(prefix)
    }
}

impl StorePrefix {
    /// Create a new store prefix from `prefix`.
    ///
    /// # Errors
    /// Returns [`StorePrefixError`] if `prefix` is not valid according to [`StorePrefix::validate()`].
    pub fn new(prefix: impl Into<String>) -> Result<Self, StorePrefixError> {
        let prefix = prefix.into();
        if Self::validate(&prefix) {
            Ok(Self(prefix))
        } else {
            Err(StorePrefixError(prefix))
        }
    }

    /// Create a new store prefix from `prefix` without validation.
    ///
    /// `prefix` is not validated, so this can result in an invalid store prefix.
    #[must_use]
    pub fn new_unchecked(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        debug_assert!(Self::validate(&prefix));
        Self(prefix)
    }

    /// The root prefix.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Extracts a string slice containing the prefix `String`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a prefix.
    #[must_use]
    pub fn validate(prefix: &str) -> bool {
        prefix.is_empty()
            || prefix
                .strip_suffix('/')
                .is_some_and(|path| path.split('/').all(|component| !component.is_empty()))
    }

    /// Returns the key for `name` under this prefix.
    ///
    /// # Errors
    /// Returns a [`StoreKeyError`] if `name` is empty or contains an empty path component.
    pub fn key(&self, name: &str) -> Result<StoreKey, StoreKeyError> {
        StoreKey::new(format!("{}{name}", self.0))
    }

    /// Returns the child prefix `name` under this prefix.
    ///
    /// # Errors
    /// Returns a [`StorePrefixError`] if `name` is empty or contains an empty path component.
    pub fn child(&self, name: &str) -> Result<Self, StorePrefixError> {
        Self::new(format!("{}{name}/", self.0))
    }

    /// The final path component of the prefix, without the trailing `/`.
    #[must_use]
    pub fn name(&self) -> &str {
        let path = self.0.strip_suffix('/').unwrap_or(&self.0);
        path.rsplit_once('/').map_or(path, |(_, name)| name)
    }
}

impl TryFrom<&str> for StorePrefix {
    type Error = StorePrefixError;

    fn try_from(prefix: &str) -> Result<Self, Self::Error> {
        Self::new(prefix)
    }
}
