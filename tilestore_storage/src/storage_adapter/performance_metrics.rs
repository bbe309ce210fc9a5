//! A storage adapter that counts store requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::byte_range::{ByteOffset, ByteRange};
use crate::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeys, StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
};

/// A snapshot of the requests seen by a [`PerformanceMetricsStorageAdapter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageMetrics {
    /// Bytes returned by whole and partial gets.
    pub bytes_read: usize,
    /// Bytes passed to whole and partial sets.
    pub bytes_written: usize,
    /// Whole and partial gets, including gets of missing keys.
    pub reads: usize,
    /// Whole and partial sets, including rejected ones.
    pub writes: usize,
    /// Allocations.
    pub allocations: usize,
    /// Erased keys, excluding prefix erasures.
    pub keys_erased: usize,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_read: AtomicUsize,
    bytes_written: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    allocations: AtomicUsize,
    keys_erased: AtomicUsize,
}

impl Counters {
    fn all(&self) -> [&AtomicUsize; 6] {
        [
            &self.bytes_read,
            &self.bytes_written,
            &self.reads,
            &self.writes,
            &self.allocations,
            &self.keys_erased,
        ]
    }

    fn record_read(&self, value: &Result<MaybeBytes, StorageError>) {
        if let Ok(Some(bytes)) = value {
            self.bytes_read.fetch_add(bytes.len(), Ordering::Relaxed);
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self, length: usize) {
        self.bytes_written.fetch_add(length, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Wraps a store and counts the requests made through it.
///
/// Tests use it to check how many tiles an array operation fetches or persists.
///
/// ### Example
/// ```rust
/// # use std::sync::Arc;
/// # use tilestore_storage::store::MemoryStore;
/// # use tilestore_storage::storage_adapter::performance_metrics::PerformanceMetricsStorageAdapter;
/// # use tilestore_storage::{Bytes, ReadableStorageTraits, StoreKey, WritableStorageTraits};
/// let store = PerformanceMetricsStorageAdapter::new(Arc::new(MemoryStore::new()));
/// let key = StoreKey::new("fragment/a.tdb")?;
/// store.set(&key, Bytes::from_static(&[1, 2, 3]))?;
/// store.get(&key)?;
/// assert_eq!(store.reads(), 1);
/// assert_eq!(store.bytes_read(), 3);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct PerformanceMetricsStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    counters: Counters,
}

impl<TStorage: ?Sized> PerformanceMetricsStorageAdapter<TStorage> {
    /// Wrap `storage` with zeroed counters.
    #[must_use]
    pub fn new(storage: Arc<TStorage>) -> Self {
        Self {
            storage,
            counters: Counters::default(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in self.counters.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// A snapshot of every counter.
    #[must_use]
    pub fn metrics(&self) -> StorageMetrics {
        let [bytes_read, bytes_written, reads, writes, allocations, keys_erased] =
            self.counters.all().map(|counter| counter.load(Ordering::Relaxed));
        StorageMetrics {
            bytes_read,
            bytes_written,
            reads,
            writes,
            allocations,
            keys_erased,
        }
    }

    /// See [`StorageMetrics::bytes_read`].
    #[must_use]
    pub fn bytes_read(&self) -> usize {
        self.metrics().bytes_read
    }

    /// See [`StorageMetrics::bytes_written`].
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.metrics().bytes_written
    }

    /// See [`StorageMetrics::reads`].
    #[must_use]
    pub fn reads(&self) -> usize {
        self.metrics().reads
    }

    /// See [`StorageMetrics::writes`].
    #[must_use]
    pub fn writes(&self) -> usize {
        self.metrics().writes
    }

    /// See [`StorageMetrics::allocations`].
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.metrics().allocations
    }

    /// See [`StorageMetrics::keys_erased`].
    #[must_use]
    pub fn keys_erased(&self) -> usize {
        self.metrics().keys_erased
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> ReadableStorageTraits
    for PerformanceMetricsStorageAdapter<TStorage>
{
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let value = self.storage.get(key);
        self.counters.record_read(&value);
        value
    }

    fn get_partial(
        &self,
        key: &StoreKey,
        byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        let value = self.storage.get_partial(key, byte_range);
        self.counters.record_read(&value);
        value
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        self.storage.size_key(key)
    }
}

impl<TStorage: ?Sized + ListableStorageTraits> ListableStorageTraits
    for PerformanceMetricsStorageAdapter<TStorage>
{
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        self.storage.list_prefix(prefix)
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        self.storage.list_dir(prefix)
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        self.storage.size_prefix(prefix)
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> WritableStorageTraits
    for PerformanceMetricsStorageAdapter<TStorage>
{
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.counters.record_write(value.len());
        self.storage.set(key, value)
    }

    fn allocate(&self, key: &StoreKey, byte_length: u64) -> Result<(), StorageError> {
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        self.storage.allocate(key, byte_length)
    }

    fn set_partial(
        &self,
        key: &StoreKey,
        offset: ByteOffset,
        value: &[u8],
    ) -> Result<(), StorageError> {
        self.counters.record_write(value.len());
        self.storage.set_partial(key, offset, value)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.counters.keys_erased.fetch_add(1, Ordering::Relaxed);
        self.storage.erase(key)
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.storage.erase_prefix(prefix)
    }
}
