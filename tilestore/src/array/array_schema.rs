//! The array schema and its builder.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tilestore_codec::Compressor;

use super::{
    Attribute, CellOrder, CellValNum, DataType, Dimension, Domain, MajorOrder,
    SchemaValidationError, Subarray, subarray::range_length,
};

/// The array schema format version written by this crate.
pub const ARRAY_SCHEMA_FORMAT_VERSION: u32 = 1;

/// The default sparse tile capacity.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Whether every cell of the domain is addressed implicitly or only written cells exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ArrayType {
    /// Every cell of the domain is addressed implicitly, cells are assigned to the regular tile grid.
    #[display("dense")]
    Dense,
    /// Only written cells exist, their coordinates are stored explicitly.
    #[display("sparse")]
    Sparse,
}

/// The serialised form of an [`ArraySchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySchemaMetadata {
    /// The schema format version.
    pub format_version: u32,
    /// The array type.
    pub array_type: ArrayType,
    /// The dimensions.
    pub dimensions: Vec<Dimension>,
    /// The attributes.
    pub attributes: Vec<Attribute>,
    /// The cell order.
    pub cell_order: CellOrder,
    /// The tile order.
    pub tile_order: MajorOrder,
    /// The maximum number of cells in a sparse tile.
    pub capacity: u64,
    /// The compressor of sparse coordinate tiles.
    #[serde(default)]
    pub coords_compressor: Compressor,
    /// The compressor of variable length offsets tiles.
    #[serde(default)]
    pub offsets_compressor: Compressor,
}

/// A validated array schema.
///
/// An [`ArraySchema`] is created from [`ArraySchemaMetadata`] or with an [`ArraySchemaBuilder`].
/// If a dense array dimension has no tile extent, the extent becomes the domain range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ArraySchemaMetadata", into = "ArraySchemaMetadata")]
pub struct ArraySchema {
    metadata: ArraySchemaMetadata,
    domain: Domain,
}

impl TryFrom<ArraySchemaMetadata> for ArraySchema {
    type Error = SchemaValidationError;

    fn try_from(metadata: ArraySchemaMetadata) -> Result<Self, Self::Error> {
        Self::new(metadata)
    }
}

impl From<ArraySchema> for ArraySchemaMetadata {
    fn from(schema: ArraySchema) -> Self {
        schema.metadata
    }
}

impl ArraySchema {
    /// Validate `metadata` and create an array schema.
    ///
    /// # Errors
    /// Returns a [`SchemaValidationError`] if the metadata is not a valid schema.
    pub fn new(mut metadata: ArraySchemaMetadata) -> Result<Self, SchemaValidationError> {
        if metadata.format_version != ARRAY_SCHEMA_FORMAT_VERSION {
            return Err(SchemaValidationError::UnsupportedFormatVersion(
                metadata.format_version,
            ));
        }
        let dense = metadata.array_type == ArrayType::Dense;
        let first_dimension = metadata
            .dimensions
            .first()
            .ok_or(SchemaValidationError::NoDimensions)?;
        let coordinate_type = first_dimension.data_type();
        if metadata.attributes.is_empty() {
            return Err(SchemaValidationError::NoAttributes);
        }

        let mut names = HashSet::new();
        let dimension_names = metadata.dimensions.iter().map(Dimension::name);
        let attribute_names = metadata.attributes.iter().map(Attribute::name);
        for name in dimension_names.chain(attribute_names) {
            if name.is_empty() || name.starts_with("__") || name.contains('/') {
                return Err(SchemaValidationError::InvalidName(name.to_string()));
            }
            if !names.insert(name) {
                return Err(SchemaValidationError::DuplicateName(name.to_string()));
            }
        }

        for dimension in &mut metadata.dimensions {
            validate_dimension(dimension, coordinate_type, dense)?;
        }
        let tile_extents: Option<Vec<u64>> = metadata
            .dimensions
            .iter()
            .map(Dimension::tile_extent)
            .collect();
        if tile_extents.is_none()
            && metadata
                .dimensions
                .iter()
                .any(|dimension| dimension.tile_extent().is_some())
        {
            return Err(SchemaValidationError::PartialTileExtents);
        }
        if let Some(tile_extents) = &tile_extents {
            tile_extents
                .iter()
                .try_fold(1u64, |n, &extent| n.checked_mul(extent))
                .ok_or(SchemaValidationError::TilingOverflow)?;
            std::iter::zip(&metadata.dimensions, tile_extents)
                .try_fold(1u64, |n, (dimension, &extent)| {
                    let [lower, upper] = dimension.domain();
                    n.checked_mul(upper.wrapping_sub(lower) as u64 / extent + 1)
                })
                .ok_or(SchemaValidationError::TilingOverflow)?;
        }

        if metadata.cell_order == CellOrder::Hilbert {
            if dense {
                return Err(SchemaValidationError::UnsupportedHilbertOrder(
                    "dense arrays must use row-major or column-major cell order".to_string(),
                ));
            }
            if metadata.dimensions.len() > 63 {
                return Err(SchemaValidationError::UnsupportedHilbertOrder(format!(
                    "{} dimensions exceed the maximum of 63",
                    metadata.dimensions.len()
                )));
            }
        }
        if !dense && metadata.capacity == 0 {
            return Err(SchemaValidationError::ZeroCapacity);
        }

        for attribute in &metadata.attributes {
            if attribute.cell_val_num() == CellValNum::Fixed(0) {
                return Err(SchemaValidationError::ZeroCellValNum(
                    attribute.name().to_string(),
                ));
            }
            if let (Some(fill_value), Some(cell_size)) =
                (attribute.fill_value(), attribute.cell_size())
            {
                if fill_value.len() != cell_size {
                    return Err(SchemaValidationError::InvalidFillValue {
                        attribute: attribute.name().to_string(),
                        expected: cell_size,
                        found: fill_value.len(),
                    });
                }
            }
        }

        let bounds = Subarray::new(
            metadata
                .dimensions
                .iter()
                .map(Dimension::domain)
                .collect(),
        );
        let domain = Domain::new(
            bounds,
            tile_extents,
            metadata.cell_order,
            metadata.tile_order,
        );
        Ok(Self { metadata, domain })
    }

    /// The schema metadata.
    #[must_use]
    pub fn metadata(&self) -> &ArraySchemaMetadata {
        &self.metadata
    }

    /// The array type.
    #[must_use]
    pub fn array_type(&self) -> ArrayType {
        self.metadata.array_type
    }

    /// Returns true if the array is dense.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.metadata.array_type == ArrayType::Dense
    }

    /// The dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.metadata.dimensions
    }

    /// The number of dimensions.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.metadata.dimensions.len()
    }

    /// The data type shared by the coordinates of every dimension.
    #[must_use]
    pub fn coordinate_type(&self) -> DataType {
        self.metadata.dimensions[0].data_type()
    }

    /// The attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.metadata.attributes
    }

    /// Returns the attribute named `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.metadata
            .attributes
            .iter()
            .find(|attribute| attribute.name() == name)
    }

    /// The domain with its tiling.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The sparse tile capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.metadata.capacity
    }

    /// The compressor of sparse coordinate tiles.
    #[must_use]
    pub fn coords_compressor(&self) -> &Compressor {
        &self.metadata.coords_compressor
    }

    /// The compressor of variable length offsets tiles.
    #[must_use]
    pub fn offsets_compressor(&self) -> &Compressor {
        &self.metadata.offsets_compressor
    }
}

fn validate_dimension(
    dimension: &mut Dimension,
    coordinate_type: DataType,
    dense: bool,
) -> Result<(), SchemaValidationError> {
    let name = || dimension.name().to_string();
    let data_type = dimension.data_type();
    let Some([type_lower, type_upper]) = data_type.coordinate_range() else {
        return Err(SchemaValidationError::UnsupportedCoordinateType {
            dimension: name(),
            data_type,
        });
    };
    if data_type != coordinate_type {
        return Err(SchemaValidationError::CoordinateTypeMismatch {
            dimension: name(),
            expected: coordinate_type,
            found: data_type,
        });
    }
    let [lower, upper] = dimension.domain();
    if upper < lower {
        return Err(SchemaValidationError::InvalidDomain {
            dimension: name(),
            lower,
            upper,
        });
    }
    if lower < type_lower || upper > type_upper {
        return Err(SchemaValidationError::DomainOutOfTypeRange {
            dimension: name(),
            data_type,
            lower,
            upper,
        });
    }
    let range = range_length(lower, upper)
        .ok_or_else(|| SchemaValidationError::DomainRangeOverflow(name()))?;
    match dimension.tile_extent() {
        None => {}
        Some(0) => return Err(SchemaValidationError::ZeroTileExtent(name())),
        Some(tile_extent) if tile_extent > range => {
            return Err(SchemaValidationError::TileExtentExceedsDomain {
                dimension: name(),
                tile_extent,
                range,
            });
        }
        Some(tile_extent) if dense && range % tile_extent != 0 => {
            return Err(SchemaValidationError::TileExtentNotDivisor {
                dimension: name(),
                tile_extent,
                range,
            });
        }
        Some(_) => {}
    }
    if dense && dimension.tile_extent().is_none() {
        dimension.set_tile_extent(Some(range));
    }
    Ok(())
}

/// An [`ArraySchema`] builder.
///
/// The default cell and tile orders are row-major, the default sparse tile capacity is [`DEFAULT_CAPACITY`], and coordinates and offsets are not compressed.
#[derive(Debug, Clone)]
pub struct ArraySchemaBuilder {
    metadata: ArraySchemaMetadata,
}

impl ArraySchemaBuilder {
    /// Create a new builder for an array of `array_type`.
    #[must_use]
    pub fn new(array_type: ArrayType) -> Self {
        Self {
            metadata: ArraySchemaMetadata {
                format_version: ARRAY_SCHEMA_FORMAT_VERSION,
                array_type,
                dimensions: Vec::new(),
                attributes: Vec::new(),
                cell_order: CellOrder::default(),
                tile_order: MajorOrder::default(),
                capacity: DEFAULT_CAPACITY,
                coords_compressor: Compressor::None,
                offsets_compressor: Compressor::None,
            },
        }
    }

    /// Append a dimension.
    pub fn dimension(&mut self, dimension: Dimension) -> &mut Self {
        self.metadata.dimensions.push(dimension);
        self
    }

    /// Append an attribute.
    pub fn attribute(&mut self, attribute: Attribute) -> &mut Self {
        self.metadata.attributes.push(attribute);
        self
    }

    /// Set the cell order.
    pub fn cell_order(&mut self, cell_order: CellOrder) -> &mut Self {
        self.metadata.cell_order = cell_order;
        self
    }

    /// Set the tile order.
    pub fn tile_order(&mut self, tile_order: MajorOrder) -> &mut Self {
        self.metadata.tile_order = tile_order;
        self
    }

    /// Set the sparse tile capacity.
    pub fn capacity(&mut self, capacity: u64) -> &mut Self {
        self.metadata.capacity = capacity;
        self
    }

    /// Set the compressor of sparse coordinate tiles.
    pub fn coords_compressor(&mut self, compressor: Compressor) -> &mut Self {
        self.metadata.coords_compressor = compressor;
        self
    }

    /// Set the compressor of variable length offsets tiles.
    pub fn offsets_compressor(&mut self, compressor: Compressor) -> &mut Self {
        self.metadata.offsets_compressor = compressor;
        self
    }

    /// Build the schema.
    ///
    /// # Errors
    /// Returns a [`SchemaValidationError`] if the schema is invalid.
    pub fn build(&self) -> Result<ArraySchema, SchemaValidationError> {
        ArraySchema::new(self.metadata.clone())
    }
}
