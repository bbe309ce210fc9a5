//! Read queries and their results.

use std::collections::BTreeMap;

use super::{ArrayError, BufferSizeMismatchError, QueryLayout, Subarray};

/// The reserved name of the coordinates buffer of a read.
///
/// Requesting it returns the interleaved coordinates of every result cell, as elements of the array coordinate data type.
pub const COORDS: &str = "__coords";

/// The region of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRegion {
    /// Every cell in a subarray.
    Subarray(Subarray),
    /// An explicit list of cells, each with one coordinate per dimension.
    ///
    /// The result follows the order of the list. A sparse read only returns the cells that exist.
    Coordinates(Vec<Vec<i64>>),
}

/// A read: a region, a result layout, and the attributes to return.
#[derive(Debug, Clone)]
pub struct ReadQuery {
    region: QueryRegion,
    layout: QueryLayout,
    attributes: Vec<String>,
}

impl ReadQuery {
    /// Create a read of every attribute in `region`.
    #[must_use]
    pub fn new(region: QueryRegion, layout: QueryLayout) -> Self {
        Self {
            region,
            layout,
            attributes: Vec::new(),
        }
    }

    /// Only return the listed attributes. [`COORDS`] requests the coordinates.
    #[must_use]
    pub fn with_attributes<S: Into<String>>(mut self, attributes: impl IntoIterator<Item = S>) -> Self {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// The region.
    #[must_use]
    pub fn region(&self) -> &QueryRegion {
        &self.region
    }

    /// The result layout.
    ///
    /// The layout of a [`QueryRegion::Coordinates`] read is ignored.
    #[must_use]
    pub fn layout(&self) -> QueryLayout {
        self.layout
    }

    /// The requested attributes. Empty requests every attribute.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
}

/// The cells of one attribute in a [`ReadResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultBuffer {
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

impl ResultBuffer {
    /// The cell bytes, or the values of variable length cells.
    #[must_use]
    pub fn values(&self) -> &[u8] {
        match self {
            Self::Fixed(values) | Self::Variable { values, .. } => values,
        }
    }

    /// The offsets of variable length cells.
    #[must_use]
    pub fn offsets(&self) -> Option<&[u64]> {
        match self {
            Self::Fixed(_) => None,
            Self::Variable { offsets, .. } => Some(offsets),
        }
    }

    /// Interpret the [values](Self::values) as native endian elements.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidElementSize`] if the values are not a whole number of `T`.
    pub fn to_elements<T: bytemuck::Pod>(&self) -> Result<Vec<T>, ArrayError> {
        let values = self.values();
        let element_size = size_of::<T>();
        if element_size == 0 || values.len() % element_size != 0 {
            return Err(ArrayError::InvalidElementSize {
                length: values.len(),
                element_size,
            });
        }
        Ok(bytemuck::pod_collect_to_vec(values))
    }

    /// The variable length cells as strings, replacing invalid UTF-8.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            Self::Fixed(_) => Vec::new(),
            Self::Variable { offsets, values } => (0..offsets.len())
                .map(|index| {
                    let start = offsets[index] as usize;
                    let end = offsets.get(index + 1).map_or(values.len(), |&end| end as usize);
                    String::from_utf8_lossy(&values[start..end]).into_owned()
                })
                .collect(),
        }
    }
}

/// The result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    cell_count: u64,
    buffers: BTreeMap<String, ResultBuffer>,
}

impl ReadResult {
    pub(crate) fn new(cell_count: u64, buffers: BTreeMap<String, ResultBuffer>) -> Self {
        Self {
            cell_count,
            buffers,
        }
    }

    /// The number of result cells.
    #[must_use]
    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    /// Returns true if the result holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cell_count == 0
    }

    /// The buffer of `name`.
    ///
    /// # Errors
    /// Returns [`ArrayError::UnknownAttribute`] if `name` was not read.
    pub fn buffer(&self, name: &str) -> Result<&ResultBuffer, ArrayError> {
        self.buffers
            .get(name)
            .ok_or_else(|| ArrayError::UnknownAttribute(name.to_string()))
    }

    /// The buffers by name.
    #[must_use]
    pub fn buffers(&self) -> &BTreeMap<String, ResultBuffer> {
        &self.buffers
    }

    /// Consume the result and return the buffers by name.
    #[must_use]
    pub fn into_buffers(self) -> BTreeMap<String, ResultBuffer> {
        self.buffers
    }
}

/// A caller provided buffer for [`Array::read_into`](crate::array::Array::read_into).
#[derive(Debug)]
pub enum OutputBuffer<'a> {
    /// Fixed length cells.
    Fixed(&'a mut [u8]),
    /// Variable length cells.
    Variable {
        /// Receives one offset per cell.
        offsets: &'a mut [u64],
        /// Receives the cell values.
        values: &'a mut [u8],
    },
}

/// The amount of an [`OutputBuffer`] filled by a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSize {
    /// The number of value bytes.
    pub values: usize,
    /// The number of offsets of a variable length buffer.
    pub offsets: Option<usize>,
}

/// The sizes produced by [`Array::read_into`](crate::array::Array::read_into).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSizes {
    /// The number of result cells.
    pub cell_count: u64,
    /// The size produced in each output buffer.
    pub sizes: BTreeMap<String, OutputSize>,
}

impl ReadResult {
    /// Copy the result into `outputs`, which must have a buffer for every result buffer.
    ///
    /// Nothing is copied unless every output is large enough.
    pub(crate) fn copy_into(
        &self,
        outputs: &mut BTreeMap<String, OutputBuffer<'_>>,
    ) -> Result<ReadSizes, ArrayError> {
        let too_small = |name: &str, required: usize, provided: usize| {
            BufferSizeMismatchError::OutputTooSmall {
                name: name.to_string(),
                required,
                provided,
            }
        };
        for (name, result) in &self.buffers {
            let output = outputs
                .get(name)
                .ok_or_else(|| BufferSizeMismatchError::MissingBuffer(name.clone()))?;
            match (result, output) {
                (ResultBuffer::Fixed(values), OutputBuffer::Fixed(output)) => {
                    if output.len() < values.len() {
                        return Err(too_small(name, values.len(), output.len()).into());
                    }
                }
                (
                    ResultBuffer::Variable { offsets, values },
                    OutputBuffer::Variable {
                        offsets: output_offsets,
                        values: output_values,
                    },
                ) => {
                    if output_offsets.len() < offsets.len() {
                        return Err(too_small(name, offsets.len(), output_offsets.len()).into());
                    }
                    if output_values.len() < values.len() {
                        return Err(too_small(name, values.len(), output_values.len()).into());
                    }
                }
                (result, _) => {
                    return Err(BufferSizeMismatchError::BufferKind {
                        name: name.clone(),
                        expected: match result {
                            ResultBuffer::Fixed(_) => "fixed length",
                            ResultBuffer::Variable { .. } => "variable length",
                        },
                        found: match output {
                            OutputBuffer::Fixed(_) => "fixed length",
                            OutputBuffer::Variable { .. } => "variable length",
                        },
                    }
                    .into());
                }
            }
        }

        let mut sizes = BTreeMap::new();
        for (name, result) in &self.buffers {
            let size = match (result, outputs.get_mut(name)) {
                (ResultBuffer::Fixed(values), Some(OutputBuffer::Fixed(output))) => {
                    output[..values.len()].copy_from_slice(values);
                    OutputSize {
                        values: values.len(),
                        offsets: None,
                    }
                }
                (
                    ResultBuffer::Variable { offsets, values },
                    Some(OutputBuffer::Variable {
                        offsets: output_offsets,
                        values: output_values,
                    }),
                ) => {
                    output_offsets[..offsets.len()].copy_from_slice(offsets);
                    output_values[..values.len()].copy_from_slice(values);
                    OutputSize {
                        values: values.len(),
                        offsets: Some(offsets.len()),
                    }
                }
                _ => continue,
            };
            sizes.insert(name.clone(), size);
        }
        Ok(ReadSizes {
            cell_count: self.cell_count,
            sizes,
        })
    }
}
