//! Write batches: the input buffers of a fragment write.

use std::collections::BTreeMap;

use super::{BufferSizeMismatchError, QueryLayout, Subarray};

/// The cells of one attribute in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeBuffer {
    /// Fixed length cells, concatenated.
    Fixed(Vec<u8>),
    /// Variable length cells.
    Variable {
        /// The byte offset of each cell in `values`.
        offsets: Vec<u64>,
        /// The cell values, concatenated.
        values: Vec<u8>,
    },
}

impl AttributeBuffer {
    /// Create a fixed length buffer from native endian elements.
    #[must_use]
    pub fn from_elements<T: bytemuck::Pod>(elements: &[T]) -> Self {
        Self::Fixed(bytemuck::cast_slice(elements).to_vec())
    }

    /// Create a variable length buffer with one cell per string.
    #[must_use]
    pub fn from_strings<S: AsRef<str>>(strings: &[S]) -> Self {
        let mut offsets = Vec::with_capacity(strings.len());
        let mut values = Vec::new();
        for string in strings {
            offsets.push(values.len() as u64);
            values.extend_from_slice(string.as_ref().as_bytes());
        }
        Self::Variable { offsets, values }
    }

    /// Create a variable length buffer from cell offsets and values.
    #[must_use]
    pub fn variable(offsets: Vec<u64>, values: Vec<u8>) -> Self {
        Self::Variable { offsets, values }
    }

    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Fixed(_) => "fixed length",
            Self::Variable { .. } => "variable length",
        }
    }

    /// The number of cells in a fixed length buffer of `cell_size` or a variable length buffer of `element_size` elements.
    pub(crate) fn cell_count(
        &self,
        name: &str,
        cell_size: Option<usize>,
        element_size: usize,
    ) -> Result<u64, BufferSizeMismatchError> {
        match (self, cell_size) {
            (Self::Fixed(bytes), Some(cell_size)) => {
                if bytes.len() % cell_size == 0 {
                    Ok((bytes.len() / cell_size) as u64)
                } else {
                    Err(BufferSizeMismatchError::NotMultipleOfCellSize {
                        name: name.to_string(),
                        length: bytes.len(),
                        cell_size,
                    })
                }
            }
            (Self::Variable { offsets, values }, None) => {
                if values.len() % element_size != 0 {
                    return Err(BufferSizeMismatchError::NotMultipleOfCellSize {
                        name: name.to_string(),
                        length: values.len(),
                        cell_size: element_size,
                    });
                }
                validate_offsets(name, offsets, values.len())?;
                Ok(offsets.len() as u64)
            }
            (buffer, cell_size) => Err(BufferSizeMismatchError::BufferKind {
                name: name.to_string(),
                expected: if cell_size.is_some() {
                    "fixed length"
                } else {
                    "variable length"
                },
                found: buffer.kind(),
            }),
        }
    }

    /// Cell `index` of a validated buffer.
    pub(crate) fn cell(&self, index: usize, cell_size: usize) -> &[u8] {
        match self {
            Self::Fixed(bytes) => &bytes[index * cell_size..(index + 1) * cell_size],
            Self::Variable { offsets, values } => {
                let start = offsets[index] as usize;
                let end = offsets
                    .get(index + 1)
                    .map_or(values.len(), |&end| end as usize);
                &values[start..end]
            }
        }
    }
}

/// Offsets must start at zero, be non-decreasing, and end within the values.
fn validate_offsets(
    name: &str,
    offsets: &[u64],
    values_len: usize,
) -> Result<(), BufferSizeMismatchError> {
    let invalid = |reason: String| BufferSizeMismatchError::InvalidOffsets {
        name: name.to_string(),
        reason,
    };
    match offsets.first() {
        Some(0) | None => {}
        Some(first) => return Err(invalid(format!("the first offset is {first}, not 0"))),
    }
    if let Some(index) = offsets.windows(2).position(|pair| pair[1] < pair[0]) {
        return Err(invalid(format!("offset {} decreases", index + 1)));
    }
    match offsets.last() {
        Some(&last) if last > values_len as u64 => Err(invalid(format!(
            "the last offset {last} exceeds the {values_len} value bytes"
        ))),
        _ => Ok(()),
    }
}

/// The cells of one write: a buffer per attribute, and coordinates or a subarray.
///
/// - A dense write covers a [`Subarray`] (by default the whole domain) in [`QueryLayout::RowMajor`], [`QueryLayout::ColMajor`], or [`QueryLayout::GlobalOrder`].
/// - A sparse write has explicit coordinates in [`QueryLayout::Unordered`], or in [`QueryLayout::GlobalOrder`] if the caller asserts they are sorted.
///
/// Every attribute of the array must have a buffer.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    layout: QueryLayout,
    subarray: Option<Subarray>,
    coordinates: Option<Vec<u8>>,
    attributes: BTreeMap<String, AttributeBuffer>,
}

impl WriteBatch {
    /// Create an empty write batch.
    #[must_use]
    pub fn new(layout: QueryLayout) -> Self {
        Self {
            layout,
            subarray: None,
            coordinates: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the subarray of a dense write.
    #[must_use]
    pub fn with_subarray(mut self, subarray: Subarray) -> Self {
        self.subarray = Some(subarray);
        self
    }

    /// Set the coordinates of a sparse write.
    ///
    /// `coordinates` are interleaved per cell, native endian, of the array coordinate data type.
    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Vec<u8>) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Set the coordinates of a sparse write from elements.
    ///
    /// `T` must match the array coordinate data type.
    #[must_use]
    pub fn with_coordinates_elements<T: bytemuck::Pod>(self, coordinates: &[T]) -> Self {
        self.with_coordinates(bytemuck::cast_slice(coordinates).to_vec())
    }

    /// Set the buffer of attribute `name`.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, buffer: AttributeBuffer) -> Self {
        self.attributes.insert(name.into(), buffer);
        self
    }

    /// The layout.
    #[must_use]
    pub fn layout(&self) -> QueryLayout {
        self.layout
    }

    /// The subarray of a dense write.
    #[must_use]
    pub fn subarray(&self) -> Option<&Subarray> {
        self.subarray.as_ref()
    }

    /// The coordinates of a sparse write.
    #[must_use]
    pub fn coordinates(&self) -> Option<&[u8]> {
        self.coordinates.as_deref()
    }

    /// The attribute buffers.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, AttributeBuffer> {
        &self.attributes
    }
}
