use serde::{Deserialize, Serialize};

use super::DataType;

/// A dimension of an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    name: String,
    data_type: DataType,
    domain: [i64; 2],
    tile_extent: Option<u64>,
}

impl Dimension {
    /// Create a new dimension with an inclusive `domain` and an optional `tile_extent`.
    ///
    /// The dimension is validated when it is added to an [`ArraySchema`](super::ArraySchema).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        domain: [i64; 2],
        tile_extent: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            domain,
            tile_extent,
        }
    }

    /// The dimension name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The coordinate data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The inclusive domain.
    #[must_use]
    pub const fn domain(&self) -> [i64; 2] {
        self.domain
    }

    /// The tile extent.
    #[must_use]
    pub const fn tile_extent(&self) -> Option<u64> {
        self.tile_extent
    }

    pub(crate) fn set_tile_extent(&mut self, tile_extent: Option<u64>) {
        self.tile_extent = tile_extent;
    }
}
