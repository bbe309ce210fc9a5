use std::io::Write;

use flate2::{read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize};

use crate::{decode_into_slice, encode_into_slice, CodecError, CompressorTraits};

/// A gzip compression level. An integer from 0 to 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct GzipCompressionLevel(u32);

impl GzipCompressionLevel {
    /// Create a new compression level.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if `level` is not between 0 and 9.
    pub fn new(level: u32) -> Result<Self, CodecError> {
        if level < 10 {
            Ok(Self(level))
        } else {
            Err(CodecError::InvalidConfiguration(format!(
                "gzip compression level {level} must be between 0 and 9"
            )))
        }
    }

    /// Returns the level as a `u32`.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for GzipCompressionLevel {
    type Error = CodecError;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<GzipCompressionLevel> for u32 {
    fn from(level: GzipCompressionLevel) -> Self {
        level.0
    }
}

/// A gzip compressor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GzipCompressor {
    level: GzipCompressionLevel,
}

impl GzipCompressor {
    /// Create a new gzip compressor with compression level `level`.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if `level` is not valid.
    pub fn new(level: u32) -> Result<Self, CodecError> {
        Ok(Self {
            level: GzipCompressionLevel::new(level)?,
        })
    }

    /// Returns the compression level.
    #[must_use]
    pub const fn level(&self) -> GzipCompressionLevel {
        self.level
    }
}

impl CompressorTraits for GzipCompressor {
    fn compress_bound(&self, input_len: usize) -> usize {
        // stored deflate blocks plus the gzip header and trailer
        input_len + input_len / 8 + 128
    }

    fn compress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        let compression = flate2::Compression::new(self.level.as_u32());
        encode_into_slice(output, |cursor| {
            let mut encoder = GzEncoder::new(cursor, compression);
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
        decode_into_slice(GzDecoder::new(input), output)
    }
}
