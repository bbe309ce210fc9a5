use thiserror::Error;
use tilestore_codec::CodecError;
use tilestore_storage::StorageError;

use super::{DataType, QueryLayout};
use crate::concurrency::ThreadPoolInitError;

/// An array creation or opening error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ArrayCreateError {
    /// The schema is invalid.
    #[error(transparent)]
    SchemaValidationError(#[from] SchemaValidationError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The array path is invalid.
    #[error("invalid array path `{0}`")]
    InvalidPath(String),
    /// An array already exists at the path.
    #[error("an array already exists at `{0}`")]
    ArrayExists(String),
    /// No array schema is stored at the path.
    #[error("the array schema is missing at `{0}`")]
    MissingSchema(String),
    /// The stored array schema cannot be parsed.
    #[error("invalid array schema metadata: {0}")]
    InvalidSchemaMetadata(String),
    /// The metadata of a fragment is invalid.
    #[error("invalid fragment metadata: {0}")]
    InvalidFragmentMetadata(String),
}

/// An array schema validation error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaValidationError {
    /// The schema has no dimensions.
    #[error("the array schema has no dimensions")]
    NoDimensions,
    /// The schema has no attributes.
    #[error("the array schema has no attributes")]
    NoAttributes,
    /// A dimension or attribute name is empty, contains `/`, or uses the reserved `__` prefix.
    #[error("invalid name `{0}`: names must be non-empty, must not contain `/`, and must not start with `__`")]
    InvalidName(String),
    /// A dimension or attribute name is used more than once.
    #[error("duplicate name `{0}`")]
    DuplicateName(String),
    /// A dimension does not have an integer data type.
    #[error("dimension `{dimension}` has unsupported coordinate data type {data_type}")]
    UnsupportedCoordinateType {
        /// The dimension name.
        dimension: String,
        /// The data type.
        data_type: DataType,
    },
    /// The dimensions do not share one coordinate data type.
    #[error("dimension `{dimension}` has data type {found}, expected {expected}")]
    CoordinateTypeMismatch {
        /// The dimension name.
        dimension: String,
        /// The data type of the first dimension.
        expected: DataType,
        /// The data type of this dimension.
        found: DataType,
    },
    /// The upper bound of a domain is below the lower bound.
    #[error("dimension `{dimension}` has invalid domain [{lower}, {upper}]")]
    InvalidDomain {
        /// The dimension name.
        dimension: String,
        /// The lower bound.
        lower: i64,
        /// The upper bound.
        upper: i64,
    },
    /// The domain bounds are not representable by the coordinate data type.
    #[error("dimension `{dimension}` domain [{lower}, {upper}] is not representable by {data_type}")]
    DomainOutOfTypeRange {
        /// The dimension name.
        dimension: String,
        /// The data type.
        data_type: DataType,
        /// The lower bound.
        lower: i64,
        /// The upper bound.
        upper: i64,
    },
    /// The number of cells along a dimension exceeds [`u64::MAX`].
    #[error("dimension `{0}` domain range does not fit in u64")]
    DomainRangeOverflow(String),
    /// A tile extent is zero.
    #[error("dimension `{0}` has a zero tile extent")]
    ZeroTileExtent(String),
    /// A tile extent exceeds the domain range.
    #[error("dimension `{dimension}` tile extent {tile_extent} exceeds the domain range {range}")]
    TileExtentExceedsDomain {
        /// The dimension name.
        dimension: String,
        /// The tile extent.
        tile_extent: u64,
        /// The number of cells in the domain.
        range: u64,
    },
    /// A dense tile extent does not evenly tile the domain.
    #[error("dimension `{dimension}` tile extent {tile_extent} does not evenly tile the domain range {range}")]
    TileExtentNotDivisor {
        /// The dimension name.
        dimension: String,
        /// The tile extent.
        tile_extent: u64,
        /// The number of cells in the domain.
        range: u64,
    },
    /// Some but not all dimensions of a sparse array have a tile extent.
    #[error("either every dimension or no dimension must have a tile extent")]
    PartialTileExtents,
    /// The number of cells in a tile or the number of tiles overflows [`u64`].
    #[error("the tiling of the domain overflows u64")]
    TilingOverflow,
    /// Hilbert cell order is only supported by sparse arrays with at most 63 dimensions.
    #[error("hilbert cell order is unsupported: {0}")]
    UnsupportedHilbertOrder(String),
    /// The sparse tile capacity is zero.
    #[error("the sparse tile capacity must be non-zero")]
    ZeroCapacity,
    /// An attribute has zero values per cell.
    #[error("attribute `{0}` must have at least one value per cell")]
    ZeroCellValNum(String),
    /// A fill value does not match the attribute cell size.
    #[error("attribute `{attribute}` fill value has {found} bytes, expected {expected}")]
    InvalidFillValue {
        /// The attribute name.
        attribute: String,
        /// The cell size.
        expected: usize,
        /// The fill value size.
        found: usize,
    },
    /// The schema format version is unsupported.
    #[error("unsupported array schema format version {0}")]
    UnsupportedFormatVersion(u32),
}

/// A mismatch between a buffer size and the cells of a write or read.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BufferSizeMismatchError {
    /// An attribute has no buffer.
    #[error("missing buffer for `{0}`")]
    MissingBuffer(String),
    /// A fixed length buffer is not a whole number of cells, or variable length values are not a whole number of elements.
    #[error("buffer `{name}` of {length} bytes is not a multiple of the cell size {cell_size}")]
    NotMultipleOfCellSize {
        /// The buffer name.
        name: String,
        /// The buffer length in bytes.
        length: usize,
        /// The cell size in bytes.
        cell_size: usize,
    },
    /// A buffer holds a different number of cells to the write.
    #[error("buffer `{name}` holds {found} cells, expected {expected}")]
    CellCountMismatch {
        /// The buffer name.
        name: String,
        /// The expected cell count.
        expected: u64,
        /// The buffer cell count.
        found: u64,
    },
    /// Variable length offsets are not well formed.
    #[error("buffer `{name}` has invalid offsets: {reason}")]
    InvalidOffsets {
        /// The buffer name.
        name: String,
        /// Why the offsets are invalid.
        reason: String,
    },
    /// A fixed length buffer was supplied for variable length cells or vice versa.
    #[error("buffer `{name}` is {found}, expected {expected}")]
    BufferKind {
        /// The buffer name.
        name: String,
        /// The expected kind.
        expected: &'static str,
        /// The supplied kind.
        found: &'static str,
    },
    /// An output buffer is smaller than the result.
    #[error("output buffer `{name}` of {provided} bytes is too small, {required} bytes are required")]
    OutputTooSmall {
        /// The buffer name.
        name: String,
        /// The number of bytes (or offsets) required.
        required: usize,
        /// The number of bytes (or offsets) provided.
        provided: usize,
    },
}

/// A coordinate outside of the array domain.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("coordinate {value} of dimension `{dimension}` is outside of the domain [{lower}, {upper}]")]
pub struct CoordinateOutOfDomainError {
    /// The dimension name.
    pub dimension: String,
    /// The coordinate.
    pub value: i128,
    /// The domain lower bound.
    pub lower: i64,
    /// The domain upper bound.
    pub upper: i64,
}

/// A tile error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum TileError {
    /// Filling the tile would exceed its capacity.
    #[error("filling {cells} cells exceeds the remaining tile capacity of {remaining} cells")]
    CapacityExceeded {
        /// The number of cells being filled.
        cells: u64,
        /// The remaining capacity.
        remaining: u64,
    },
    /// Data is not a whole number of cells.
    #[error("{length} bytes is not a multiple of the cell size {cell_size}")]
    NotMultipleOfCellSize {
        /// The data length.
        length: usize,
        /// The cell size.
        cell_size: usize,
    },
    /// The operation requires an uncompressed tile.
    #[error("the tile is compressed")]
    Compressed,
    /// A read is out of the bounds of the tile.
    #[error("range {offset}..{offset}+{length} is out of bounds of a tile of {size} bytes")]
    OutOfBounds {
        /// The offset.
        offset: usize,
        /// The length.
        length: usize,
        /// The tile size.
        size: usize,
    },
    /// A variable length tile does not have one offset per cell, or the offsets are not monotonic.
    #[error("inconsistent variable length tile: {0}")]
    Inconsistent(String),
    /// Compression failed.
    #[error(transparent)]
    Compression(CodecError),
    /// Decompression failed.
    #[error(transparent)]
    Decompression(CodecError),
}

/// An array error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ArrayError {
    /// A buffer size mismatch.
    #[error(transparent)]
    BufferSizeMismatchError(#[from] BufferSizeMismatchError),
    /// A coordinate outside of the array domain.
    #[error(transparent)]
    CoordinateOutOfDomainError(#[from] CoordinateOutOfDomainError),
    /// Compressing a tile failed.
    #[error("tile compression failed: {0}")]
    CompressionError(CodecError),
    /// Decompressing a tile failed.
    #[error("tile decompression failed: {0}")]
    DecompressionError(CodecError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The thread pool could not be initialised.
    #[error(transparent)]
    ThreadPoolInitError(#[from] ThreadPoolInitError),
    /// A tile error.
    #[error(transparent)]
    TileError(TileError),
    /// The query region is invalid.
    #[error("invalid query region: {0}")]
    InvalidQueryRegion(String),
    /// The layout is unsupported by the operation.
    #[error("layout {layout} is unsupported: {reason}")]
    InvalidLayout {
        /// The layout.
        layout: QueryLayout,
        /// Why the layout is unsupported.
        reason: &'static str,
    },
    /// The write batch does not match the array type.
    #[error("invalid write batch: {0}")]
    InvalidWriteBatch(String),
    /// Coordinates asserted to be in global order are not.
    #[error("coordinates are not in global order at cell {0}")]
    UnsortedCoordinates(usize),
    /// A write batch holds the same coordinates more than once.
    #[error("duplicate coordinates {0:?}")]
    DuplicateCoordinates(Vec<i64>),
    /// The attribute does not exist.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),
    /// A fragment is inconsistent with its metadata.
    #[error("invalid fragment metadata: {0}")]
    InvalidFragmentMetadata(String),
    /// Result elements cannot be interpreted as the requested type.
    #[error("a buffer of {length} bytes cannot be interpreted as elements of size {element_size}")]
    InvalidElementSize {
        /// The buffer length.
        length: usize,
        /// The element size.
        element_size: usize,
    },
    /// The fragment metadata could not be serialised.
    #[error("failed to serialise fragment metadata: {0}")]
    SerializationError(String),
}

impl From<TileError> for ArrayError {
    fn from(err: TileError) -> Self {
        match err {
            TileError::Compression(err) => Self::CompressionError(err),
            TileError::Decompression(err) => Self::DecompressionError(err),
            err => Self::TileError(err),
        }
    }
}
