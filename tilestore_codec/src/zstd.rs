use serde::{Deserialize, Serialize};

use crate::{CodecError, CompressorTraits};

/// A Zstandard compressor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ZstdCompressorConfiguration")]
pub struct ZstdCompressor {
    level: i32,
}

#[derive(Deserialize)]
struct ZstdCompressorConfiguration {
    level: i32,
}

impl TryFrom<ZstdCompressorConfiguration> for ZstdCompressor {
    type Error = CodecError;

    fn try_from(configuration: ZstdCompressorConfiguration) -> Result<Self, Self::Error> {
        Self::new(configuration.level)
    }
}

impl ZstdCompressor {
    /// Create a new Zstandard compressor with compression level `level`.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if `level` is outside the range supported by the linked zstd library.
    pub fn new(level: i32) -> Result<Self, CodecError> {
        if ::zstd::compression_level_range().contains(&level) {
            Ok(Self { level })
        } else {
            Err(CodecError::InvalidConfiguration(format!(
                "zstd compression level {level} is not supported"
            )))
        }
    }

    /// Returns the compression level.
    #[must_use]
    pub const fn level(&self) -> i32 {
        self.level
    }
}

impl CompressorTraits for ZstdCompressor {
    fn compress_bound(&self, input_len: usize) -> usize {
        ::zstd::zstd_safe::compress_bound(input_len)
    }

    fn compress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        let capacity = output.len();
        ::zstd::bulk::compress_to_buffer(input, output, self.level)
            .map_err(|_| CodecError::InsufficientOutputCapacity { capacity })
    }

    fn decompress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        ::zstd::bulk::decompress_to_buffer(input, output)
            .map_err(|err| CodecError::InvalidInput(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_util, Compressor};

    #[test]
    fn zstd_round_trip() {
        for level in [1, 3, 19] {
            let compressor = Compressor::Zstd(ZstdCompressor::new(level).unwrap());
            test_util::round_trip(&compressor, 1);
            test_util::round_trip(&compressor, 8);
        }
    }

    #[test]
    fn zstd_undersized_output() {
        test_util::undersized_output(&Compressor::Zstd(ZstdCompressor::new(3).unwrap()), 8);
    }

    #[test]
    fn zstd_corrupt() {
        let compressor = Compressor::Zstd(ZstdCompressor::new(3).unwrap());
        let input = test_util::bytes(1000);
        let encoded = compressor.compress_to_vec(1, &input).unwrap();
        assert!(
            compressor
                .decompress_to_vec(1, &encoded[..encoded.len() / 2], input.len())
                .is_err()
        );
        assert!(
            compressor
                .decompress_to_vec(1, &[0xde, 0xad, 0xbe, 0xef], input.len())
                .is_err()
        );
    }

    #[test]
    fn zstd_invalid_level() {
        assert!(ZstdCompressor::new(1000).is_err());
        assert!(
            serde_json::from_str::<Compressor>(r#"{"name":"zstd","configuration":{"level":1000}}"#)
                .is_err()
        );
    }
}
