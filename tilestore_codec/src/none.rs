use crate::{check_capacity, CodecError, CompressorTraits};

/// The identity compressor.
///
/// Copies input through unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoCompressor;

impl CompressorTraits for NoCompressor {
    fn compress_bound(&self, input_len: usize) -> usize {
        input_len
    }

    fn compress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        check_capacity(input.len(), output)?;
        output[..input.len()].copy_from_slice(input);
        Ok(input.len())
    }

    fn decompress(
        &self,
        _element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        check_capacity(input.len(), output)?;
        output[..input.len()].copy_from_slice(input);
        Ok(input.len())
    }
}
