use std::io::Write;

use bzip2::{read::BzDecoder, write::BzEncoder};
use serde::{Deserialize, Serialize};

use crate::{decode_into_slice, encode_into_slice, CodecError, CompressorTraits};

/// A bzip2 compression level. An integer from 1 to 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Bz2CompressionLevel(u32);

impl Bz2CompressionLevel {
    /// Create a new compression level.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if `level` is not between 1 and 9.
    pub fn new(level: u32) -> Result<Self, CodecError> {
        if (1..=9).contains(&level) {
            Ok(Self(level))
        } else {
            Err(CodecError::InvalidConfiguration(format!(
                "bz2 compression level {level} must be between 1 and 9"
            )))
        }
    }

    /// Returns the level as a `u32`.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Bz2CompressionLevel {
    type Error = CodecError;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<Bz2CompressionLevel> for u32 {
    fn from(level: Bz2CompressionLevel) -> Self {
        level.0
    }
}

/// A bzip2 compressor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bz2Compressor {
    level: Bz2CompressionLevel,
}

impl Bz2Compressor {
    /// Create a new bzip2 compressor with compression level `level`.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if `level` is not valid.
    pub fn new(level: u32) -> Result<Self, CodecError> {
        Ok(Self {
            level: Bz2CompressionLevel::new(level)?,
        })
    }
}

impl CompressorTraits for Bz2Compressor {
    fn compress_bound(&self, input_len: usize) -> usize {
        const MIN_PAD_SIZE: usize = 1024;
        input_len + input_len / 8 + MIN_PAD_SIZE
    }

    fn compress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        let compression = bzip2::Compression::new(self.level.as_u32());
        encode_into_slice(output, |cursor| {
            let mut encoder = BzEncoder::new(cursor, compression);
            encoder.write_all(input)?;
            encoder.finish()
        })
    }

    fn decompress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        decode_into_slice(BzDecoder::new(input), output)
    }
}
