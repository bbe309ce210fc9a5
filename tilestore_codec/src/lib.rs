//! The tile compressor API for the [`tilestore`](https://docs.rs/tilestore/latest/tilestore/index.html) crate.
//!
//! A [`Compressor`] is bound to each attribute, dimension, and offsets region of an array schema.
//! Every algorithm implements [`CompressorTraits`]:
//!  - [`compress_bound`](CompressorTraits::compress_bound) never under-estimates the compressed size, and callers allocate exactly that much before compressing,
//!  - [`compress`](CompressorTraits::compress) and [`decompress`](CompressorTraits::decompress) write into a caller-provided buffer and fail if its capacity is insufficient or the input is structurally invalid.
//!
//! The element size is passed to every algorithm so type-aware transforms such as [byte shuffling](ShuffleCompressor) can use it.
//!
//! ### Compressors
//! | name | feature | type |
//! |------|---------|------|
//! | `none` | | [`NoCompressor`] |
//! | `gzip` | `gzip` | [`GzipCompressor`] |
//! | `zstd` | `zstd` | [`ZstdCompressor`] |
//! | `lz4` | `lz4` | [`Lz4Compressor`] |
//! | `bz2` | `bz2` | [`Bz2Compressor`] |
//! | `shuffle` | | [`ShuffleCompressor`] |
//!
//! ## Licence
//! `tilestore_codec` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod none;
mod shuffle;

#[cfg(feature = "bz2")]
mod bz2;
#[cfg(feature = "gzip")]
mod gzip;
#[cfg(feature = "lz4")]
mod lz4;
#[cfg(feature = "zstd")]
mod zstd;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use none::NoCompressor;
pub use shuffle::ShuffleCompressor;

#[cfg(feature = "bz2")]
pub use bz2::{Bz2CompressionLevel, Bz2Compressor};
#[cfg(feature = "gzip")]
pub use gzip::{GzipCompressionLevel, GzipCompressor};
#[cfg(feature = "lz4")]
pub use lz4::Lz4Compressor;
#[cfg(feature = "zstd")]
pub use zstd::ZstdCompressor;

/// The compressor capability.
pub trait CompressorTraits {
    /// Return the worst-case compressed size of `input_len` bytes.
    fn compress_bound(&self, input_len: usize) -> usize;

    /// Compress `input` into `output`, returning the compressed length.
    ///
    /// `element_size` is the size in bytes of one element of `input`.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if `output` is too small or the input is not valid for this compressor.
    /// The contents of `output` are unspecified on error.
    fn compress(
        &self,
        element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError>;

    /// Decompress `input` into `output`, returning the decompressed length.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if `output` is too small or `input` is corrupt or truncated.
    /// The contents of `output` are unspecified on error.
    fn decompress(
        &self,
        element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError>;
}

/// A compressor bound to a region of an array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "name", content = "configuration", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Compressor {
    /// No compression.
    #[default]
    None,
    /// Gzip compression.
    #[cfg(feature = "gzip")]
    Gzip(GzipCompressor),
    /// Zstandard compression.
    #[cfg(feature = "zstd")]
    Zstd(ZstdCompressor),
    /// LZ4 block compression.
    #[cfg(feature = "lz4")]
    Lz4(Lz4Compressor),
    /// Bzip2 compression.
    #[cfg(feature = "bz2")]
    Bz2(Bz2Compressor),
    /// Byte shuffling followed by another compressor.
    Shuffle(ShuffleCompressor),
}

impl Compressor {
    /// The name of the compressor.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            #[cfg(feature = "gzip")]
            Self::Gzip(_) => "gzip",
            #[cfg(feature = "zstd")]
            Self::Zstd(_) => "zstd",
            #[cfg(feature = "lz4")]
            Self::Lz4(_) => "lz4",
            #[cfg(feature = "bz2")]
            Self::Bz2(_) => "bz2",
            Self::Shuffle(_) => "shuffle",
        }
    }

    fn as_traits(&self) -> &dyn CompressorTraits {
        match self {
            Self::None => &NoCompressor,
            #[cfg(feature = "gzip")]
            Self::Gzip(compressor) => compressor,
            #[cfg(feature = "zstd")]
            Self::Zstd(compressor) => compressor,
            #[cfg(feature = "lz4")]
            Self::Lz4(compressor) => compressor,
            #[cfg(feature = "bz2")]
            Self::Bz2(compressor) => compressor,
            Self::Shuffle(compressor) => compressor,
        }
    }

    /// Compress `input` into a new buffer sized by [`compress_bound`](CompressorTraits::compress_bound) and truncated to the compressed length.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if compression fails.
    pub fn compress_to_vec(&self, element_size: usize, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut output = vec![0; self.compress_bound(input.len())];
        let length = self.compress(element_size, input, &mut output)?;
        output.truncate(length);
        Ok(output)
    }

    /// Decompress `input` into a new buffer of `decompressed_len` bytes.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if decompression fails or does not produce exactly `decompressed_len` bytes.
    pub fn decompress_to_vec(
        &self,
        element_size: usize,
        input: &[u8],
        decompressed_len: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let mut output = vec![0; decompressed_len];
        let length = self.decompress(element_size, input, &mut output)?;
        if length == decompressed_len {
            Ok(output)
        } else {
            Err(CodecError::UnexpectedDecodedLength {
                expected: decompressed_len,
                actual: length,
            })
        }
    }
}

impl CompressorTraits for Compressor {
    fn compress_bound(&self, input_len: usize) -> usize {
        self.as_traits().compress_bound(input_len)
    }

    fn compress(
        &self,
        element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        self.as_traits().compress(element_size, input, output)
    }

    fn decompress(
        &self,
        element_size: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CodecError> {
        self.as_traits().decompress(element_size, input, output)
    }
}

/// A compressor error.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The output buffer is too small.
    #[error("output buffer of {capacity} bytes is too small")]
    InsufficientOutputCapacity {
        /// The capacity of the output buffer.
        capacity: usize,
    },
    /// The input is corrupt or truncated.
    #[error("invalid compressed input: {0}")]
    InvalidInput(String),
    /// The input length is not a multiple of the element size.
    #[error("input of {length} bytes is not a multiple of the element size {element_size}")]
    InvalidElementSize {
        /// The element size.
        element_size: usize,
        /// The input length.
        length: usize,
    },
    /// Decoding produced an unexpected number of bytes.
    #[error("decoded {actual} bytes, expected {expected}")]
    UnexpectedDecodedLength {
        /// The expected length.
        expected: usize,
        /// The decoded length.
        actual: usize,
    },
    /// An invalid compressor configuration.
    #[error("invalid compressor configuration: {0}")]
    InvalidConfiguration(String),
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

/// Checks the output capacity for a copy of `length` bytes.
fn check_capacity(length: usize, output: &[u8]) -> Result<(), CodecError> {
    if output.len() < length {
        Err(CodecError::InsufficientOutputCapacity {
            capacity: output.len(),
        })
    } else {
        Ok(())
    }
}

/// Runs a `std::io::Write` based encoder into a fixed size `output` buffer.
#[cfg(any(feature = "gzip", feature = "bz2"))]
fn encode_into_slice<F>(output: &mut [u8], encode: F) -> Result<usize, CodecError>
where
    F: FnOnce(std::io::Cursor<&mut [u8]>) -> std::io::Result<std::io::Cursor<&mut [u8]>>,
{
    let capacity = output.len();
    match encode(std::io::Cursor::new(output)) {
        Ok(cursor) => usize::try_from(cursor.position())
            .map_err(|_| CodecError::InsufficientOutputCapacity { capacity }),
        Err(err) if err.kind() == std::io::ErrorKind::WriteZero => {
            Err(CodecError::InsufficientOutputCapacity { capacity })
        }
        Err(err) => Err(err.into()),
    }
}

/// Drains a `std::io::Read` based decoder into a fixed size `output` buffer.
///
/// Fails if the decoder produces more than `output.len()` bytes.
#[cfg(any(feature = "gzip", feature = "bz2"))]
fn decode_into_slice(
    mut decoder: impl std::io::Read,
    output: &mut [u8],
) -> Result<usize, CodecError> {
    let invalid = |err: std::io::Error| CodecError::InvalidInput(err.to_string());
    let mut written = 0;
    while written < output.len() {
        let read = decoder.read(&mut output[written..]).map_err(invalid)?;
        if read == 0 {
            return Ok(written);
        }
        written += read;
    }
    let mut probe = [0u8; 1];
    if decoder.read(&mut probe).map_err(invalid)? == 0 {
        Ok(written)
    } else {
        Err(CodecError::InsufficientOutputCapacity {
            capacity: output.len(),
        })
    }
}

#[cfg(test)]
mod test_util {
    use super::{Compressor, CompressorTraits};

    pub(crate) fn bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from((i / 3) % 251).unwrap()).collect()
    }

    /// Round trips empty, single element, and larger inputs.
    pub(crate) fn round_trip(compressor: &Compressor, element_size: usize) {
        for len in [0, element_size, element_size * 1000] {
            let input = bytes(len);
            let encoded = compressor.compress_to_vec(element_size, &input).unwrap();
            assert!(encoded.len() <= compressor.compress_bound(len));
            let decoded = compressor
                .decompress_to_vec(element_size, &encoded, len)
                .unwrap();
            assert_eq!(decoded, input);
        }
    }

    /// Decompression into a buffer one byte too small fails.
    pub(crate) fn undersized_output(compressor: &Compressor, element_size: usize) {
        let input = bytes(element_size * 100);
        let encoded = compressor.compress_to_vec(element_size, &input).unwrap();
        let mut output = vec![0; input.len() - 1];
        assert!(
            compressor
                .decompress(element_size, &encoded, &mut output)
                .is_err()
        );
        let mut output = vec![0; 1];
        assert!(compressor.compress(element_size, &input, &mut output).is_err());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressor_metadata() {
        let compressor: Compressor = serde_json::from_str(r#"{"name":"none"}"#).unwrap();
        assert_eq!(compressor, Compressor::None);
        assert_eq!(serde_json::to_string(&Compressor::None).unwrap(), r#"{"name":"none"}"#);
        assert!(serde_json::from_str::<Compressor>(r#"{"name":"unknown"}"#).is_err());
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn compressor_metadata_nested() {
        let json = r#"{"name":"shuffle","configuration":{"inner":{"name":"zstd","configuration":{"level":3}}}}"#;
        let compressor: Compressor = serde_json::from_str(json).unwrap();
        assert_eq!(compressor.name(), "shuffle");
        assert_eq!(serde_json::to_string(&compressor).unwrap(), json);
    }

    #[test]
    fn decompress_to_vec_length_mismatch() {
        let compressor = Compressor::None;
        assert!(matches!(
            compressor.decompress_to_vec(1, &[1, 2, 3], 4),
            Err(CodecError::UnexpectedDecodedLength {
                expected: 4,
                actual: 3
            })
        ));
    }
}
