//! An in-memory store.

use std::collections::{BTreeMap, BTreeSet};

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::byte_range::{ByteOffset, ByteRange, extract_byte_range};
use crate::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeys, StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
};

/// An in-memory store.
///
/// Values live in an ordered map, so listings come back sorted by key.
/// Every request holds the map lock for its whole duration, which makes each request atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<StoreKey, BytesMut>>,
}

impl MemoryStore {
    /// Create an empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of values held by the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Returns true if the store holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get_partial(
        &self,
        key: &StoreKey,
        byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        let values = self.values.lock();
        values
            .get(key)
            .map(|value| Ok(Bytes::copy_from_slice(extract_byte_range(value, byte_range)?)))
            .transpose()
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.values.lock().get(key).map(|value| value.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.values
            .lock()
            .insert(key.clone(), BytesMut::from(value.as_ref()));
        Ok(())
    }

    fn allocate(&self, key: &StoreKey, byte_length: u64) -> Result<(), StorageError> {
        let Ok(byte_length_usize) = usize::try_from(byte_length) else {
            return Err(format!("{byte_length} bytes cannot be held in memory").into());
        };
        self.values
            .lock()
            .insert(key.clone(), BytesMut::zeroed(byte_length_usize));
        Ok(())
    }

    fn set_partial(
        &self,
        key: &StoreKey,
        offset: ByteOffset,
        value: &[u8],
    ) -> Result<(), StorageError> {
        let mut values = self.values.lock();
        let Some(allocation) = values.get_mut(key) else {
            return Err(StorageError::MissingKey(key.clone()));
        };
        let range = ByteRange::FromStart(offset, Some(value.len() as u64))
            .to_usize_range(allocation.len() as u64)?;
        allocation[range].copy_from_slice(value);
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.values.lock().retain(|key, _| !key.has_prefix(prefix));
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .values
            .lock()
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let values = self.values.lock();
        let mut keys = StoreKeys::new();
        let mut children = BTreeSet::new();
        for key in values.keys() {
            let Some(relative) = key.as_str().strip_prefix(prefix.as_str()) else {
                continue;
            };
            if let Some((child, _)) = relative.split_once('/') {
                children.insert(prefix.child(child)?);
            } else {
                keys.push(key.clone());
            }
        }
        Ok(StoreKeysPrefixes::new(keys, children.into_iter().collect()))
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        Ok(self
            .values
            .lock()
            .iter()
            .filter_map(|(key, value)| key.has_prefix(prefix).then_some(value.len() as u64))
            .sum())
    }
}
