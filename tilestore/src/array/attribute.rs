use serde::{Deserialize, Serialize};
use tilestore_codec::Compressor;

use super::DataType;

/// The number of values in each cell of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum CellValNum {
    /// Every cell holds the same number of values.
    #[display("{_0}")]
    Fixed(u32),
    /// Every cell holds any number of values.
    #[display("var")]
    Var,
}

impl Default for CellValNum {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

/// An attribute of an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    data_type: DataType,
    #[serde(default)]
    cell_val_num: CellValNum,
    #[serde(default)]
    compressor: Compressor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fill_value: Option<Vec<u8>>,
}

impl Attribute {
    /// Create a new attribute holding one value per cell without compression.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            cell_val_num: CellValNum::default(),
            compressor: Compressor::None,
            fill_value: None,
        }
    }

    /// Set the number of values per cell.
    #[must_use]
    pub fn with_cell_val_num(mut self, cell_val_num: CellValNum) -> Self {
        self.cell_val_num = cell_val_num;
        self
    }

    /// Set the compressor.
    #[must_use]
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    /// Set the fill value of a fixed length attribute.
    ///
    /// It must be exactly [`cell_size`](Self::cell_size) bytes.
    #[must_use]
    pub fn with_fill_value(mut self, fill_value: Vec<u8>) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// The attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The number of values per cell.
    #[must_use]
    pub const fn cell_val_num(&self) -> CellValNum {
        self.cell_val_num
    }

    /// The compressor.
    #[must_use]
    pub const fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Returns true if cells are variable length.
    #[must_use]
    pub const fn is_var(&self) -> bool {
        matches!(self.cell_val_num, CellValNum::Var)
    }

    /// The size of a cell in bytes, or [`None`] if cells are variable length.
    #[must_use]
    pub fn cell_size(&self) -> Option<usize> {
        match self.cell_val_num {
            CellValNum::Fixed(n) => Some(n as usize * self.data_type.size()),
            CellValNum::Var => None,
        }
    }

    /// The configured fill value, if any.
    #[must_use]
    pub fn fill_value(&self) -> Option<&[u8]> {
        self.fill_value.as_deref()
    }

    /// The value of a cell no fragment has written.
    ///
    /// This is the configured fill value, or zero bytes for fixed length cells and an empty value for variable length cells.
    #[must_use]
    pub fn fill_cell(&self) -> std::borrow::Cow<'_, [u8]> {
        match (&self.fill_value, self.cell_size()) {
            (Some(fill_value), _) => std::borrow::Cow::Borrowed(fill_value),
            (None, Some(cell_size)) => std::borrow::Cow::Owned(vec![0; cell_size]),
            (None, None) => std::borrow::Cow::Borrowed(&[]),
        }
    }
}
