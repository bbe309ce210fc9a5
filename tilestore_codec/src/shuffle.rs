use serde::{Deserialize, Serialize};

use crate::{CodecError, Compressor, CompressorTraits};

/// A byte shuffle followed by another compressor.
///
/// The shuffle groups byte `k` of every element together, which typically improves the compression ratio of numeric data.
/// Inputs with an element size of one byte are passed to the inner compressor unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ShuffleCompressorConfiguration")]
pub struct ShuffleCompressor {
    inner: Box<Compressor>,
}

#[derive(Deserialize)]
struct ShuffleCompressorConfiguration {
    inner: Compressor,
}

impl TryFrom<ShuffleCompressorConfiguration> for ShuffleCompressor {
    type Error = CodecError;

    fn try_from(configuration: ShuffleCompressorConfiguration) -> Result<Self, Self::Error> {
        Self::new(configuration.inner)
    }
}

impl ShuffleCompressor {
    /// Create a new shuffle compressor wrapping `inner`.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidConfiguration`] if `inner` is itself a shuffle compressor.
    pub fn new(inner: Compressor) -> Result<Self, CodecError> {
        if matches!(inner, Compressor::Shuffle(_)) {
            Err(CodecError::InvalidConfiguration(
                "shuffle compressors cannot be nested".to_string(),
            ))
        } else {
            Ok(Self {
                inner: Box::new(inner),
            })
        }
    }

    /// Returns the inner compressor.
    #[must_use]
    pub fn inner(&self) -> &Compressor {
        &self.inner
    }
}

fn check_element_size(element_size: usize, length: usize) -> Result<(), CodecError> {
    if element_size == 0 || !length.is_multiple_of(element_size) {
        Err(CodecError::InvalidElementSize {
            element_size,
            length,
        })
    } else {
        Ok(())
    }
}

fn shuffle(element_size: usize, decoded: &[u8]) -> Vec<u8> {
    let mut encoded = vec![0; decoded.len()];
    let count = decoded.len() / element_size;
    for i in 0..count {
        let offset = i * element_size;
        for byte_index in 0..element_size {
            encoded[byte_index * count + i] = decoded[offset + byte_index];
        }
    }
    encoded
}

fn unshuffle(element_size: usize, encoded: &[u8], decoded: &mut [u8]) {
    let count = encoded.len() / element_size;
    for byte_index in 0..element_size {
        let offset = byte_index * count;
        for i in 0..count {
            decoded[i * element_size + byte_index] = encoded[offset + i];
        }
    }
}

impl CompressorTraits for ShuffleCompressor {
    fn compress_bound(&self, input_len: usize) -> usize {
        self.inner.compress_bound(input_len)
    }

    fn compress(
        &self,
        element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        if element_size == 1 {
            return self.inner.compress(element_size, input, output);
        }
        check_element_size(element_size, input.len())?;
        let shuffled = shuffle(element_size, input);
        self.inner.compress(element_size, &shuffled, output)
    }

    fn decompress(
        &self,
        element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        if element_size == 1 {
            return self.inner.decompress(element_size, input, output);
        }
        let mut shuffled = vec![0; output.len()];
        let length = self.inner.decompress(element_size, input, &mut shuffled)?;
        check_element_size(element_size, length)?;
        unshuffle(element_size, &shuffled[..length], &mut output[..length]);
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    #[test]
    fn shuffle_transpose() {
        let input = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let shuffled = shuffle(4, &input);
        assert_eq!(shuffled, [0, 4, 1, 5, 2, 6, 3, 7]);
        let mut output = [0u8; 8];
        unshuffle(4, &shuffled, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn shuffle_round_trip() {
        let compressor = Compressor::Shuffle(ShuffleCompressor::new(Compressor::None).unwrap());
        test_util::round_trip(&compressor, 1);
        test_util::round_trip(&compressor, 8);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn shuffle_zstd_round_trip() {
        let inner = Compressor::Zstd(crate::ZstdCompressor::new(3).unwrap());
        let compressor = Compressor::Shuffle(ShuffleCompressor::new(inner).unwrap());
        test_util::round_trip(&compressor, 4);
        test_util::undersized_output(&compressor, 4);
    }

    #[test]
    fn shuffle_invalid() {
        let compressor = ShuffleCompressor::new(Compressor::None).unwrap();
        let mut output = vec![0; 16];
        assert!(matches!(
            compressor.compress(4, &[0; 6], &mut output),
            Err(CodecError::InvalidElementSize {
                element_size: 4,
                length: 6
            })
        ));
        assert!(compressor.compress(0, &[0; 6], &mut output).is_err());
        assert!(ShuffleCompressor::new(Compressor::Shuffle(compressor)).is_err());
    }
}
