use auto_impl::auto_impl;

use crate::byte_range::{ByteOffset, ByteRange};
use crate::{Bytes, MaybeBytes, StorageError, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix};

/// Reads values from a store.
///
/// Arrays read their schema and fragment metadata whole, and tiles as byte ranges of a region.
#[auto_impl(Arc, &)]
pub trait ReadableStorageTraits: Send + Sync {
    /// Read the whole value at `key`, or [`None`] if there is no value.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store cannot be read.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.get_partial(key, ByteRange::FromStart(0, None))
    }

    /// Read `byte_range` of the value at `key`, or [`None`] if there is no value.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store cannot be read or `byte_range` extends past the end of the value.
    fn get_partial(&self, key: &StoreKey, byte_range: ByteRange)
    -> Result<MaybeBytes, StorageError>;

    /// The size of the value at `key` in bytes, or [`None`] if there is no value.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store cannot be read.
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError>;
}

/// Lists the keys of a store.
///
/// Opening an array lists its prefix to discover fragments.
#[auto_impl(Arc, &)]
pub trait ListableStorageTraits: Send + Sync {
    /// Every key under `prefix`, at any depth.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store cannot be listed.
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError>;

    /// The keys and prefixes directly under `prefix`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store cannot be listed.
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError>;

    /// The total size in bytes of the values under `prefix`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store cannot be listed.
    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError>;
}

/// Writes values to a store.
///
/// A fragment region is written by one [`allocate`](WritableStorageTraits::allocate) followed by one [`set_partial`](WritableStorageTraits::set_partial) per tile.
/// Metadata is written whole with [`set`](WritableStorageTraits::set).
#[auto_impl(Arc, &)]
pub trait WritableStorageTraits: Send + Sync {
    /// Write `value` at `key`, replacing any existing value.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the value cannot be written.
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError>;

    /// Replace the value at `key` with `byte_length` zero bytes.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the value cannot be allocated.
    fn allocate(&self, key: &StoreKey, byte_length: u64) -> Result<(), StorageError>;

    /// Overwrite the bytes at `offset` of the allocated value at `key` with `value`.
    ///
    /// The bytes must lie within the allocation and are durable once this returns.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the key has not been allocated, the write extends past the end of the allocation, or the write fails.
    fn set_partial(&self, key: &StoreKey, offset: ByteOffset, value: &[u8])
    -> Result<(), StorageError>;

    /// Remove the value at `key`, if any.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the value cannot be removed.
    fn erase(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Remove every value under `prefix`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if a value cannot be removed.
    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError>;
}
