//! Cell orders and query layouts.

use serde::{Deserialize, Serialize};

/// A row-major or column-major linearisation of a multidimensional index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum MajorOrder {
    /// The last dimension varies fastest.
    #[default]
    #[display("row-major")]
    RowMajor,
    /// The first dimension varies fastest.
    #[display("column-major")]
    ColMajor,
}

/// The order of cells within a tile of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum CellOrder {
    /// Row-major.
    #[default]
    #[display("row-major")]
    RowMajor,
    /// Column-major.
    #[display("column-major")]
    ColMajor,
    /// The Hilbert space-filling curve, ties broken row-major.
    ///
    /// Only valid for sparse arrays.
    #[display("hilbert")]
    Hilbert,
}

impl CellOrder {
    /// Returns the equivalent [`MajorOrder`], or [`None`] for [`CellOrder::Hilbert`].
    #[must_use]
    pub const fn major_order(self) -> Option<MajorOrder> {
        match self {
            Self::RowMajor => Some(MajorOrder::RowMajor),
            Self::ColMajor => Some(MajorOrder::ColMajor),
            Self::Hilbert => None,
        }
    }
}

/// The cell layout of a [`WriteBatch`](crate::array::WriteBatch) or a [`ReadResult`](crate::array::ReadResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum QueryLayout {
    /// Row-major over the query subarray.
    #[display("row-major")]
    RowMajor,
    /// Column-major over the query subarray.
    #[display("column-major")]
    ColMajor,
    /// The global order of the array: tiles in tile order, then cells in cell order.
    #[display("global order")]
    GlobalOrder,
    /// No particular order.
    ///
    /// Sparse writes are sorted into the global order. Reads produce the global order.
    #[display("unordered")]
    Unordered,
}
