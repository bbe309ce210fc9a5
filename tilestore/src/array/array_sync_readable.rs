use std::{collections::BTreeMap, sync::Arc};

use super::{
    ARRAY_SCHEMA_KEY, Array, ArrayCreateError, ArrayError, ArraySchema, ArraySchemaMetadata,
    Fragment, OutputBuffer, QueryOptions, ReadQuery, ReadResult, ReadSizes,
    fragment::fragment_name_timestamp, fragment_reader::read_fragments, path_prefix,
};
use crate::storage::{ListableStorageTraits, ReadableStorageTraits, StorageError, StorePrefix};

impl<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static> Array<TStorage> {
    /// Open an existing array at `path`, loading its schema and fragments.
    ///
    /// Fragment prefixes without fragment metadata are incomplete writes and are skipped.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if
    ///  - there is no array schema at `path`,
    ///  - the schema or a fragment's metadata is invalid, or
    ///  - there is an underlying store error.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        let prefix = path_prefix(path)?;
        let key = prefix.key(ARRAY_SCHEMA_KEY).map_err(StorageError::from)?;
        let bytes = storage
            .get(&key)?
            .ok_or_else(|| ArrayCreateError::MissingSchema(path.to_string()))?;
        let metadata: ArraySchemaMetadata = serde_json::from_slice(&bytes)
            .map_err(|err| ArrayCreateError::InvalidSchemaMetadata(err.to_string()))?;
        let schema = ArraySchema::new(metadata)?;
        let fragments = list_fragments(storage.as_ref(), &prefix, &schema)?;
        log::debug!("opened array at {path} with {} fragments", fragments.len());
        Self::new(storage, path, schema, fragments)
    }

    /// Rediscover the fragments of the array, including those written by other array handles.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if a fragment's metadata is invalid or there is an underlying store error.
    pub fn reload_fragments(&self) -> Result<(), ArrayCreateError> {
        let fragments = list_fragments(self.storage.as_ref(), &self.prefix, &self.schema)?;
        *self.fragments.write() = fragments;
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + 'static> Array<TStorage> {
    /// Read `query` with default [`QueryOptions`].
    ///
    /// # Errors
    /// See [`read_opt`](Array::read_opt).
    pub fn read(&self, query: &ReadQuery) -> Result<ReadResult, ArrayError> {
        self.read_opt(query, &QueryOptions::default())
    }

    /// Read `query`.
    ///
    /// A region that overlaps no written cell returns an empty result.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the region is invalid or outside of the domain,
    ///  - an attribute does not exist,
    ///  - a tile fails to decompress or is inconsistent with the fragment metadata, or
    ///  - there is an underlying store error.
    pub fn read_opt(
        &self,
        query: &ReadQuery,
        options: &QueryOptions,
    ) -> Result<ReadResult, ArrayError> {
        let fragments = self.fragments();
        let fragments: Vec<&Fragment> = fragments.iter().map(AsRef::as_ref).collect();
        read_fragments(
            self.storage.as_ref(),
            &self.schema,
            &fragments,
            query,
            options,
        )
    }

    /// Read `query` into caller provided `outputs` with default [`QueryOptions`].
    ///
    /// # Errors
    /// See [`read_into_opt`](Array::read_into_opt).
    pub fn read_into(
        &self,
        query: &ReadQuery,
        outputs: &mut BTreeMap<String, OutputBuffer<'_>>,
    ) -> Result<ReadSizes, ArrayError> {
        self.read_into_opt(query, outputs, &QueryOptions::default())
    }

    /// Read `query` into caller provided `outputs` and return the produced sizes.
    ///
    /// `outputs` must hold a buffer of the matching kind for every requested attribute.
    /// If any output is too small, [`BufferSizeMismatchError::OutputTooSmall`](super::BufferSizeMismatchError::OutputTooSmall) reports the required size and no output is modified.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if [`read_opt`](Array::read_opt) fails or an output is missing, of the wrong kind, or too small.
    pub fn read_into_opt(
        &self,
        query: &ReadQuery,
        outputs: &mut BTreeMap<String, OutputBuffer<'_>>,
        options: &QueryOptions,
    ) -> Result<ReadSizes, ArrayError> {
        self.read_opt(query, options)?.copy_into(outputs)
    }
}

/// List the fragments under `prefix`, oldest first.
fn list_fragments<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
    storage: &TStorage,
    prefix: &StorePrefix,
    schema: &ArraySchema,
) -> Result<Vec<Arc<Fragment>>, ArrayCreateError> {
    let mut fragments = Vec::new();
    for fragment_prefix in storage.list_dir(prefix)?.prefixes() {
        if fragment_name_timestamp(fragment_prefix.name()).is_none() {
            continue;
        }
        match Fragment::open(storage, fragment_prefix.clone(), schema)? {
            Some(fragment) => fragments.push(Arc::new(fragment)),
            None => log::warn!("skipping {fragment_prefix}: it has no fragment metadata"),
        }
    }
    fragments.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| a.prefix().cmp(b.prefix()))
    });
    Ok(fragments)
}
