//! Tile-based arrays.
//!
//! An array is defined by its [`ArraySchema`] (encoded as JSON at `<array>/__array_schema.json`):
//!  - **array type**: dense (every cell of the domain is addressed implicitly) or sparse (cells carry explicit coordinates),
//!  - **dimensions**: the name, integer coordinate type, domain, and tile extent of each dimension,
//!  - **attributes**: the name, element type, values per cell (fixed or variable), compressor, and fill value of each attribute,
//!  - **cell order** and **tile order**: the linearisation of cells within a tile and of tiles within the domain, and
//!  - **capacity**: the maximum number of cells in a sparse tile.
//!
//! The documentation for [`Array`] details how to interact with arrays.

mod array_errors;
mod array_schema;
mod attribute;
mod data_type;
mod dimension;
mod domain;
mod fragment;
mod fragment_reader;
mod fragment_writer;
mod layout;
mod query_options;
mod read_query;
mod subarray;
mod tile;
mod write_batch;

mod array_sync_readable;
mod array_sync_writable;

use std::sync::Arc;

use parking_lot::RwLock;
use tilestore_storage::StorePrefix;

pub use self::array_errors::{
    ArrayCreateError, ArrayError, BufferSizeMismatchError, CoordinateOutOfDomainError,
    SchemaValidationError, TileError,
};
pub use self::array_schema::{
    ARRAY_SCHEMA_FORMAT_VERSION, ArraySchema, ArraySchemaBuilder, ArraySchemaMetadata, ArrayType,
    DEFAULT_CAPACITY,
};
pub use self::attribute::{Attribute, CellValNum};
pub use self::data_type::DataType;
pub use self::dimension::Dimension;
pub use self::domain::{Domain, TilesOverlapping};
pub use self::fragment::{
    AttributeRegions, FRAGMENT_FORMAT_VERSION, FRAGMENT_METADATA_KEY, Fragment, FragmentMetadata,
    RegionMetadata, TileLocation,
};
pub use self::layout::{CellOrder, MajorOrder, QueryLayout};
pub use self::query_options::QueryOptions;
pub use self::read_query::{
    COORDS, OutputBuffer, OutputSize, QueryRegion, ReadQuery, ReadResult, ReadSizes, ResultBuffer,
};
pub use self::subarray::Subarray;
pub use self::tile::{Tile, VarTile};
pub use self::write_batch::{AttributeBuffer, WriteBatch};

/// The key of the array schema relative to the array prefix.
pub const ARRAY_SCHEMA_KEY: &str = "__array_schema.json";

/// A tile-based dense or sparse array.
///
/// ## Initialisation
/// A *new* array is initialised with [`Array::create`], which validates the schema and stores it.
/// An *existing* array is initialised with [`Array::open`], which loads the schema and discovers the fragments.
///
/// ## Writing
/// Each [`write`](Array::write) of a [`WriteBatch`] produces one immutable [`Fragment`].
/// Fragments are never modified or merged by later writes.
/// A write that fails leaves the visible fragments unchanged.
///
/// ## Reading
/// A [`read`](Array::read) of a [`ReadQuery`] returns the cells of a [`QueryRegion`] resolved across every fragment, newest first.
/// [`read_into`](Array::read_into) copies the result into caller provided buffers and reports the produced sizes.
///
/// ## Parallelism and Concurrency
/// Tiles are filled, compressed, and decompressed in parallel on a process-wide thread pool (see [`concurrency`](crate::concurrency)).
/// A call returns only once all of its tile tasks are complete.
/// The number of concurrent tile tasks can be limited globally with [`Config::set_tile_concurrent_target`](crate::config::Config::set_tile_concurrent_target) or per call with the `_opt` methods and [`QueryOptions`].
#[derive(Debug)]
pub struct Array<TStorage: ?Sized> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the array, such as `/array`.
    path: String,
    /// The store prefix of the array.
    prefix: StorePrefix,
    /// The validated schema.
    schema: Arc<ArraySchema>,
    /// The visible fragments, oldest first.
    fragments: RwLock<Vec<Arc<Fragment>>>,
}

impl<TStorage: ?Sized> Array<TStorage> {
    fn new(
        storage: Arc<TStorage>,
        path: &str,
        schema: ArraySchema,
        fragments: Vec<Arc<Fragment>>,
    ) -> Result<Self, ArrayCreateError> {
        Ok(Self {
            storage,
            path: path.to_string(),
            prefix: path_prefix(path)?,
            schema: Arc::new(schema),
            fragments: RwLock::new(fragments),
        })
    }

    /// Get the underlying storage backing the array.
    #[must_use]
    pub fn storage(&self) -> Arc<TStorage> {
        self.storage.clone()
    }

    /// Get the path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the store prefix.
    #[must_use]
    pub fn prefix(&self) -> &StorePrefix {
        &self.prefix
    }

    /// Get the schema.
    #[must_use]
    pub fn schema(&self) -> &ArraySchema {
        &self.schema
    }

    /// Get a snapshot of the visible fragments, oldest first.
    #[must_use]
    pub fn fragments(&self) -> Vec<Arc<Fragment>> {
        self.fragments.read().clone()
    }

    /// The number of visible fragments.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments.read().len()
    }

    /// The bounding box of the non-empty domains of every fragment.
    ///
    /// Returns [`None`] if the array has no fragments.
    #[must_use]
    pub fn non_empty_domain(&self) -> Option<Subarray> {
        let fragments = self.fragments.read();
        let mut fragments = fragments.iter();
        let mut domain = fragments.next()?.non_empty_domain().clone();
        for fragment in fragments {
            let ranges = fragment.non_empty_domain().ranges();
            domain.expand(&ranges.iter().map(|&[lower, _]| lower).collect::<Vec<_>>());
            domain.expand(&ranges.iter().map(|&[_, upper]| upper).collect::<Vec<_>>());
        }
        Some(domain)
    }

    /// Register a new fragment, keeping the fragments sorted by timestamp.
    fn push_fragment(&self, fragment: Arc<Fragment>) {
        let mut fragments = self.fragments.write();
        let position = fragments.partition_point(|existing| existing.timestamp() <= fragment.timestamp());
        fragments.insert(position, fragment);
    }

    fn latest_timestamp(&self) -> u64 {
        self.fragments
            .read()
            .iter()
            .map(|fragment| fragment.timestamp())
            .max()
            .unwrap_or(0)
    }
}

/// The store prefix of an absolute array path.
///
/// `/` is the root of the store and `/group/array` maps to `group/array/`.
fn path_prefix(path: &str) -> Result<StorePrefix, ArrayCreateError> {
    let invalid = || ArrayCreateError::InvalidPath(path.to_string());
    let relative = path.strip_prefix('/').ok_or_else(invalid)?;
    let relative = relative.strip_suffix('/').unwrap_or(relative);
    if relative.is_empty() {
        Ok(StorePrefix::root())
    } else {
        StorePrefix::new(format!("{relative}/")).map_err(|_| invalid())
    }
}
