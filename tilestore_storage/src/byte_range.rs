//! Byte ranges within stored values.
//!
//! Fragment readers fetch single tiles out of a region with a [`ByteRange::FromStart`] built from the tile offset and compressed size recorded in the fragment metadata.

use std::ops::Range;

use thiserror::Error;

/// An offset in bytes from the start of a value.
pub type ByteOffset = u64;

/// A length in bytes.
pub type ByteLength = u64;

/// A range of bytes within a value whose total size is only known to the store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ByteRange {
    /// Bytes from an offset, for a length or to the end of the value if [`None`].
    FromStart(ByteOffset, Option<ByteLength>),
    /// The last bytes of a value.
    Suffix(ByteLength),
}

impl From<Range<u64>> for ByteRange {
    fn from(range: Range<u64>) -> Self {
        let length = range.end.saturating_sub(range.start);
        Self::FromStart(range.start, Some(length))
    }
}

impl ByteRange {
    /// The inclusive start of the range in a value of `size` bytes.
    #[must_use]
    pub fn start(&self, size: u64) -> u64 {
        match *self {
            Self::FromStart(offset, _) => offset,
            Self::Suffix(length) => size.saturating_sub(length),
        }
    }

    /// The exclusive end of the range in a value of `size` bytes.
    #[must_use]
    pub fn end(&self, size: u64) -> u64 {
        match *self {
            Self::FromStart(offset, Some(length)) => offset.saturating_add(length),
            Self::FromStart(_, None) | Self::Suffix(_) => size,
        }
    }

    /// The number of bytes covered in a value of `size` bytes.
    #[must_use]
    pub fn length(&self, size: u64) -> u64 {
        self.end(size).saturating_sub(self.start(size))
    }

    /// Returns true if every byte of the range exists in a value of `size` bytes.
    #[must_use]
    pub fn is_valid(&self, size: u64) -> bool {
        match *self {
            Self::FromStart(offset, length) => {
                matches!(offset.checked_add(length.unwrap_or(0)), Some(end) if end <= size)
            }
            Self::Suffix(length) => length <= size,
        }
    }

    /// The range as indices into a value of `size` bytes held in memory.
    ///
    /// # Errors
    /// Returns [`InvalidByteRangeError`] if the range is not valid for `size`.
    pub fn to_usize_range(&self, size: u64) -> Result<Range<usize>, InvalidByteRangeError> {
        let invalid = || InvalidByteRangeError::new(*self, size);
        if !self.is_valid(size) {
            return Err(invalid());
        }
        let start = usize::try_from(self.start(size)).map_err(|_| invalid())?;
        let end = usize::try_from(self.end(size)).map_err(|_| invalid())?;
        Ok(start..end)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::FromStart(offset, Some(length)) => {
                write!(f, "{offset}..{}", offset.saturating_add(length))
            }
            Self::FromStart(offset, None) => write!(f, "{offset}.."),
            Self::Suffix(length) => write!(f, "-{length}.."),
        }
    }
}

/// A byte range that does not fit inside a value.
#[derive(Copy, Clone, Debug, Error)]
#[error("byte range {byte_range} exceeds a value of {size} bytes")]
pub struct InvalidByteRangeError {
    byte_range: ByteRange,
    size: u64,
}

impl InvalidByteRangeError {
    /// Create a new [`InvalidByteRangeError`] for `byte_range` in a value of `size` bytes.
    #[must_use]
    pub fn new(byte_range: ByteRange, size: u64) -> Self {
        Self { byte_range, size }
    }

    /// The offending byte range.
    #[must_use]
    pub const fn byte_range(&self) -> ByteRange {
        self.byte_range
    }
}

/// Slice `byte_range` out of `bytes`.
///
/// # Errors
/// Returns [`InvalidByteRangeError`] if the range extends past the end of `bytes`.
pub fn extract_byte_range(bytes: &[u8], byte_range: ByteRange) -> Result<&[u8], InvalidByteRangeError> {
    let range = byte_range.to_usize_range(bytes.len() as u64)?;
    Ok(&bytes[range])
}
