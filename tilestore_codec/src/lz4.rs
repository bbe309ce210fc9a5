use serde::{Deserialize, Serialize};

use crate::{CodecError, CompressorTraits};

/// An LZ4 block compressor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lz4Compressor {}

impl Lz4Compressor {
    /// Create a new LZ4 compressor.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

impl CompressorTraits for Lz4Compressor {
    fn compress_bound(&self, input_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(input_len)
    }

    fn compress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        let capacity = output.len();
        lz4_flex::block::compress_into(input, output)
            .map_err(|_| CodecError::InsufficientOutputCapacity { capacity })
    }

    fn decompress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        let capacity = output.len();
        lz4_flex::block::decompress_into(input, output).map_err(|err| match err {
            lz4_flex::block::DecompressError::OutputTooSmall { .. } => {
                CodecError::InsufficientOutputCapacity { capacity }
            }
            err => CodecError::InvalidInput(err.to_string()),
        })
    }
}
