//! The storage backend API for the [`tilestore`](https://docs.rs/tilestore/latest/tilestore/index.html) crate.
//!
//! A store holds the values a tiled array is persisted as: the array schema, fragment metadata, and one region per attribute or dimension of each fragment.
//! Values are addressed by a [`StoreKey`] and grouped under [`StorePrefix`]es.
//!
//! Beyond whole-value `get`/`set`, the write path relies on [`WritableStorageTraits::allocate`] followed by any number of [`WritableStorageTraits::set_partial`] calls at byte offsets inside the allocation, and the read path on [`ReadableStorageTraits::get_partial`].
//! A completed write must be durable before it returns.
//!
//! This crate includes an in-memory store implementation and a [`PerformanceMetricsStorageAdapter`](storage_adapter::performance_metrics::PerformanceMetricsStorageAdapter).
//!
//! ## Licence
//! `tilestore_storage` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod storage_adapter;
mod storage_sync;
pub mod store;
mod store_key;
mod store_prefix;

pub mod byte_range;


use std::sync::Arc;

use thiserror::Error;

use byte_range::InvalidByteRangeError;

pub use store_key::{StoreKey, StoreKeyError, StoreKeys};
pub use store_prefix::{StorePrefix, StorePrefixError, StorePrefixes};

pub use self::storage_sync::{ListableStorageTraits, ReadableStorageTraits, WritableStorageTraits};

/// A stored value, shared without copying.
pub type Bytes = bytes::Bytes;

/// A value read from a store, or [`None`] if the key has no value.
pub type MaybeBytes = Option<Bytes>;

/// The result of [`ListableStorageTraits::list_dir`]: the keys and the child prefixes directly under a prefix.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StoreKeysPrefixes {
    keys: StoreKeys,
    prefixes: StorePrefixes,
}

impl StoreKeysPrefixes {
    /// Create a listing from `keys` and child `prefixes`.
    #[must_use]
    pub fn new(keys: StoreKeys, prefixes: StorePrefixes) -> Self {
        Self { keys, prefixes }
    }

    /// The keys directly under the listed prefix.
    #[must_use]
    pub const fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// The child prefixes of the listed prefix, such as the fragments of an array.
    #[must_use]
    pub const fn prefixes(&self) -> &StorePrefixes {
        &self.prefixes
    }
}

/// A storage error.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The store does not accept writes.
    #[error("the store is read only")]
    ReadOnly,
    /// The underlying storage failed.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// A prefix is not a valid store prefix.
    #[error("invalid store prefix {0}")]
    StorePrefixError(#[from] StorePrefixError),
    /// A key is not a valid store key.
    #[error("invalid store key {0}")]
    InvalidStoreKey(#[from] StoreKeyError),
    /// A byte range lies outside of a value.
    #[error("invalid byte range {0}")]
    InvalidByteRangeError(#[from] InvalidByteRangeError),
    /// A partial write targeted a key that has not been allocated.
    #[error("key {0} has not been allocated")]
    MissingKey(StoreKey),
    /// The store does not support a request.
    #[error("{0}")]
    Unsupported(String),
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        err.to_string().into()
    }
}
