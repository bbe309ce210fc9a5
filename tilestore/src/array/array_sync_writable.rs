use std::sync::Arc;

use super::{
    ARRAY_SCHEMA_KEY, Array, ArrayCreateError, ArrayError, ArraySchema, ArraySchemaMetadata,
    Fragment, QueryOptions, WriteBatch,
    fragment::{fragment_name, next_timestamp},
    fragment_writer::write_fragment,
    path_prefix,
};
use crate::storage::{Bytes, ReadableStorageTraits, StorageError, WritableStorageTraits};

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + 'static> Array<TStorage> {
    /// Create a new array at `path` with `schema`, and store the schema.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if
    ///  - `path` is not an absolute path,
    ///  - an array schema is already stored at `path`, or
    ///  - there is an underlying store error.
    pub fn create(
        storage: Arc<TStorage>,
        path: &str,
        schema: ArraySchema,
    ) -> Result<Self, ArrayCreateError> {
        let prefix = path_prefix(path)?;
        let key = prefix.key(ARRAY_SCHEMA_KEY).map_err(StorageError::from)?;
        if storage.size_key(&key)?.is_some() {
            return Err(ArrayCreateError::ArrayExists(path.to_string()));
        }
        let metadata: ArraySchemaMetadata = schema.clone().into();
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|err| ArrayCreateError::InvalidSchemaMetadata(err.to_string()))?;
        storage.set(&key, Bytes::from(json))?;
        log::debug!(
            "created {} array at {path} with {} dimensions and {} attributes",
            schema.array_type(),
            schema.dimensionality(),
            schema.attributes().len()
        );
        Self::new(storage, path, schema, Vec::new())
    }

    /// Write `batch` as a new fragment with default [`QueryOptions`].
    ///
    /// # Errors
    /// See [`write_opt`](Array::write_opt).
    pub fn write(&self, batch: &WriteBatch) -> Result<Arc<Fragment>, ArrayError> {
        self.write_opt(batch, &QueryOptions::default())
    }

    /// Write `batch` as a new fragment.
    ///
    /// The fragment is appended to the visible fragments once its metadata is stored.
    /// Its timestamp is later than that of every fragment of the array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the batch does not match the array type or layout,
    ///  - a buffer does not hold the cells of the write,
    ///  - a coordinate is outside of the domain,
    ///  - coordinates asserted to be in global order are unsorted or duplicated,
    ///  - a tile fails to compress, or
    ///  - there is an underlying store error.
    ///
    /// No fragment is visible after an error.
    pub fn write_opt(
        &self,
        batch: &WriteBatch,
        options: &QueryOptions,
    ) -> Result<Arc<Fragment>, ArrayError> {
        let timestamp = next_timestamp(self.latest_timestamp());
        let fragment = write_fragment(
            self.storage.as_ref(),
            &self.prefix,
            &fragment_name(timestamp),
            timestamp,
            &self.schema,
            batch,
            options,
        )?;
        let fragment = Arc::new(fragment);
        self.push_fragment(fragment.clone());
        Ok(fragment)
    }
}
