//! A filesystem store for the [`tilestore`](https://docs.rs/tilestore/latest/tilestore/index.html) crate.
//!
//! Each [`StoreKey`] maps to one file below the store's base directory, and each [`StorePrefix`] to a directory.
//! Fragment regions are [allocated](WritableStorageTraits::allocate) as files of their final length and then filled in place with positioned writes.
//!
//! ## Licence
//! `tilestore_filesystem` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tilestore_storage::byte_range::{ByteOffset, ByteRange};
use tilestore_storage::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeyError, StoreKeys, StoreKeysPrefixes, StorePrefix, StorePrefixes,
    WritableStorageTraits,
};
use walkdir::WalkDir;

/// Options for a [`FilesystemStore`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct FilesystemStoreOptions {
    sync_writes: bool,
}

impl Default for FilesystemStoreOptions {
    fn default() -> Self {
        Self { sync_writes: true }
    }
}

impl FilesystemStoreOptions {
    /// Set whether file data is flushed to the device (`fsync`) before a write returns.
    ///
    /// Enabled by default. Without it a completed fragment write may not survive a crash.
    pub fn sync_writes(&mut self, sync_writes: bool) -> &mut Self {
        self.sync_writes = sync_writes;
        self
    }
}

/// Maps a "not found" IO error to [`None`].
fn if_exists<T>(result: std::io::Result<T>) -> std::io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// A file system store.
///
/// Requests on one key are serialised by a per-key lock, except for partial writes which may run concurrently because the writer never overlaps them.
#[derive(Debug)]
pub struct FilesystemStore {
    base_path: PathBuf,
    sort: bool,
    readonly: bool,
    options: FilesystemStoreOptions,
    locks: Mutex<HashMap<StoreKey, Arc<RwLock<()>>>>,
}

impl FilesystemStore {
    /// Create a new file system store at `base_path`.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_path` is not valid UTF-8 or is an existing file.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, FilesystemStoreCreateError> {
        Self::new_with_options(base_path, FilesystemStoreOptions::default())
    }

    /// Create a new file system store at `base_path` with `options`.
    ///
    /// The base directory is only created by the first write.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_path` is not valid UTF-8 or is an existing file.
    pub fn new_with_options<P: AsRef<Path>>(
        base_path: P,
        options: FilesystemStoreOptions,
    ) -> Result<Self, FilesystemStoreCreateError> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.to_str().is_none() || base_path.is_file() {
            return Err(FilesystemStoreCreateError::InvalidBasePath(base_path));
        }

        let readonly = if base_path.exists() {
            std::fs::metadata(&base_path)?.permissions().readonly()
        } else {
            // probe that the directory can be created
            std::fs::create_dir_all(&base_path)?;
            std::fs::remove_dir(&base_path)?;
            false
        };
        log::debug!(
            "opened filesystem store at {} (readonly: {readonly})",
            base_path.display()
        );

        Ok(Self {
            base_path,
            sort: false,
            readonly,
            options,
            locks: Mutex::default(),
        })
    }

    /// Sort keys and prefixes returned by [`ListableStorageTraits::list_dir`].
    #[must_use]
    pub const fn sorted(mut self) -> Self {
        self.sort = true;
        self
    }

    /// The file holding the value of `key`.
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    /// The directory holding the values under `prefix`.
    #[must_use]
    pub fn prefix_to_fs_path(&self, prefix: &StorePrefix) -> PathBuf {
        self.base_path.join(prefix.as_str())
    }

    fn fspath_to_key(&self, path: &Path) -> Result<StoreKey, StoreKeyError> {
        let Some(relative) = pathdiff::diff_paths(path, &self.base_path) else {
            return Err(StoreKeyError::from(path.to_string_lossy().as_ref()));
        };
        let relative = relative.to_string_lossy();
        if cfg!(target_os = "windows") {
            StoreKey::new(relative.replace('\\', "/"))
        } else {
            StoreKey::new(relative)
        }
    }

    fn lock(&self, key: &StoreKey) -> Arc<RwLock<()>> {
        self.locks.lock().entry(key.clone()).or_default().clone()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.readonly {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Create or truncate the file of `key`, along with its parent directories.
    fn create_file(&self, key: &StoreKey) -> Result<File, StorageError> {
        let path = self.key_to_fspath(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(File::create(path)?)
    }

    fn finish_write(&self, file: &File) -> Result<(), StorageError> {
        if self.options.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }
}

impl ReadableStorageTraits for FilesystemStore {
    fn get_partial(
        &self,
        key: &StoreKey,
        byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        let lock = self.lock(key);
        let _guard = lock.read();
        let Some(mut file) = if_exists(File::open(self.key_to_fspath(key)))? else {
            return Ok(None);
        };

        let range = byte_range.to_usize_range(file.metadata()?.len())?;
        let mut value = vec![0; range.len()];
        file.seek(SeekFrom::Start(range.start as u64))?;
        file.read_exact(&mut value)?;
        Ok(Some(Bytes::from(value)))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let metadata = if_exists(std::fs::metadata(self.key_to_fspath(key)))?;
        Ok(metadata
            .filter(std::fs::Metadata::is_file)
            .map(|metadata| metadata.len()))
    }
}

impl WritableStorageTraits for FilesystemStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.check_writable()?;
        let lock = self.lock(key);
        let _guard = lock.write();
        let mut file = self.create_file(key)?;
        file.write_all(&value)?;
        self.finish_write(&file)
    }

    fn allocate(&self, key: &StoreKey, byte_length: u64) -> Result<(), StorageError> {
        self.check_writable()?;
        let lock = self.lock(key);
        let _guard = lock.write();
        let file = self.create_file(key)?;
        file.set_len(byte_length)?;
        self.finish_write(&file)
    }

    fn set_partial(
        &self,
        key: &StoreKey,
        offset: ByteOffset,
        value: &[u8],
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        let lock = self.lock(key);
        let _guard = lock.read();
        let opened = OpenOptions::new().write(true).open(self.key_to_fspath(key));
        let Some(mut file) = if_exists(opened)? else {
            return Err(StorageError::MissingKey(key.clone()));
        };

        ByteRange::FromStart(offset, Some(value.len() as u64))
            .to_usize_range(file.metadata()?.len())?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(value)?;
        self.finish_write(&file)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.check_writable()?;
        let lock = self.lock(key);
        let _guard = lock.write();
        if_exists(std::fs::remove_file(self.key_to_fspath(key)))?;
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.check_writable()?;
        // no key can be locked while the lock table is held
        let _locks = self.locks.lock();
        let path = self.prefix_to_fs_path(prefix);
        if prefix != &StorePrefix::root() {
            if_exists(std::fs::remove_dir_all(path))?;
            return Ok(());
        }

        // the base directory itself is kept
        let Some(entries) = if_exists(std::fs::read_dir(path))? else {
            return Ok(());
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(path)?;
            } else {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

impl ListableStorageTraits for FilesystemStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(WalkDir::new(self.prefix_to_fs_path(prefix))
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.fspath_to_key(entry.path()).ok())
            .collect())
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys = StoreKeys::new();
        let mut prefixes = StorePrefixes::new();
        let Some(entries) = if_exists(std::fs::read_dir(self.prefix_to_fs_path(prefix)))? else {
            return Ok(StoreKeysPrefixes::new(keys, prefixes));
        };
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                log::warn!("skipping non UTF-8 path {}", path.display());
                continue;
            };
            if path.is_dir() {
                prefixes.push(prefix.child(name)?);
            } else {
                keys.push(prefix.key(name)?);
            }
        }
        if self.sort {
            keys.sort();
            prefixes.sort();
        }
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        self.list_prefix(prefix)?
            .iter()
            .try_fold(0, |size, key| Ok(size + self.size_key(key)?.unwrap_or(0)))
    }
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The path is not valid UTF-8 or is a file.
    #[error("base path {0} is not valid")]
    InvalidBasePath(PathBuf),
}
