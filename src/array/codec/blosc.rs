//! The `blosc` bytes to bytes codec.
//!
//! Compresses with the [blosc](https://www.blosc.org/) container format.

use std::{
    ffi::{c_char, c_int, c_void},
    sync::Arc,
};

use async_trait::async_trait;
use blosc_src::{
    blosc_cbuffer_validate, blosc_compress_ctx, blosc_decompress_ctx, BLOSC_BITSHUFFLE,
    BLOSC_BLOSCLZ_COMPNAME, BLOSC_LZ4HC_COMPNAME, BLOSC_LZ4_COMPNAME, BLOSC_MAX_OVERHEAD,
    BLOSC_NOSHUFFLE, BLOSC_SHUFFLE, BLOSC_SNAPPY_COMPNAME, BLOSC_ZLIB_COMPNAME,
    BLOSC_ZSTD_COMPNAME,
};
use derive_more::From;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::BytesRepresentation,
    byte_range::{extract_byte_ranges, ByteRange},
    metadata::Metadata,
};

use super::{
    BytesPartialDecoderTraits, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecTraits,
};

/// The identifier of the `blosc` codec.
pub const IDENTIFIER: &str = "blosc";

#[derive(Debug, Error, From)]
#[error("{0}")]
struct BloscError(String);

impl From<&str> for BloscError {
    fn from(err: &str) -> Self {
        Self(err.to_string())
    }
}

/// An integer from 0 to 9 controlling the blosc compression level.
///
/// 0 disables compression, 9 compresses most.
#[derive(Serialize, Copy, Clone, Eq, PartialEq, Debug)]
pub struct BloscCompressionLevel(u8);

impl TryFrom<u8> for BloscCompressionLevel {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if level <= 9 {
            Ok(Self(level))
        } else {
            Err(level)
        }
    }
}

impl<'de> serde::Deserialize<'de> for BloscCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = u8::deserialize(d)?;
        if level <= 9 {
            Ok(Self(level))
        } else {
            Err(serde::de::Error::custom("clevel must be between 0 and 9"))
        }
    }
}

/// The blosc shuffle mode.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum BloscShuffleMode {
    /// No shuffling.
    NoShuffle,
    /// Byte-wise shuffling.
    Shuffle,
    /// Bit-wise shuffling.
    BitShuffle,
}

impl BloscShuffleMode {
    const fn as_c_int(self) -> c_int {
        match self {
            Self::NoShuffle => BLOSC_NOSHUFFLE as c_int,
            Self::Shuffle => BLOSC_SHUFFLE as c_int,
            Self::BitShuffle => BLOSC_BITSHUFFLE as c_int,
        }
    }
}

/// The blosc backing compressor.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum BloscCompressor {
    /// BloscLZ, the blosc default.
    BloscLZ,
    /// LZ4.
    LZ4,
    /// LZ4HC.
    LZ4HC,
    /// Snappy.
    Snappy,
    /// Zlib.
    Zlib,
    /// Zstd.
    Zstd,
}

impl BloscCompressor {
    const fn as_cstr(self) -> *const u8 {
        match self {
            Self::BloscLZ => BLOSC_BLOSCLZ_COMPNAME.as_ptr(),
            Self::LZ4 => BLOSC_LZ4_COMPNAME.as_ptr(),
            Self::LZ4HC => BLOSC_LZ4HC_COMPNAME.as_ptr(),
            Self::Snappy => BLOSC_SNAPPY_COMPNAME.as_ptr(),
            Self::Zlib => BLOSC_ZLIB_COMPNAME.as_ptr(),
            Self::Zstd => BLOSC_ZSTD_COMPNAME.as_ptr(),
        }
    }
}

/// Configuration parameters for the `blosc` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct BloscCodecConfiguration {
    /// The backing compressor.
    pub cname: BloscCompressor,
    /// The compression level.
    pub clevel: BloscCompressionLevel,
    /// The shuffle mode.
    pub shuffle: BloscShuffleMode,
    /// The element size used for shuffling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typesize: Option<usize>,
    /// The compression block size. Automatically determined if 0.
    #[serde(default)]
    pub blocksize: usize,
}

/// A `blosc` codec implementation.
#[derive(Clone, Debug)]
pub struct BloscCodec {
    configuration: BloscCodecConfiguration,
}

impl BloscCodec {
    /// Create a new `blosc` codec.
    ///
    /// `typesize` is required unless the shuffle mode is
    /// [`BloscShuffleMode::NoShuffle`].
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if shuffling is enabled without a typesize.
    pub fn new(
        cname: BloscCompressor,
        clevel: BloscCompressionLevel,
        shuffle: BloscShuffleMode,
        typesize: Option<usize>,
        blocksize: usize,
    ) -> Result<Self, CodecCreateError> {
        if shuffle != BloscShuffleMode::NoShuffle && typesize.unwrap_or_default() == 0 {
            return Err(CodecCreateError::Other(
                "a positive typesize is required when blosc shuffling is enabled".to_string(),
            ));
        }
        Ok(Self {
            configuration: BloscCodecConfiguration {
                cname,
                clevel,
                shuffle,
                typesize,
                blocksize,
            },
        })
    }

    /// Create a new `blosc` codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if the configuration is invalid.
    pub fn new_with_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        let configuration: BloscCodecConfiguration = metadata.to_configuration()?;
        Self::new(
            configuration.cname,
            configuration.clevel,
            configuration.shuffle,
            configuration.typesize,
            configuration.blocksize,
        )
    }
}

fn blosc_compress_bytes(
    src: &[u8],
    clevel: BloscCompressionLevel,
    shuffle: BloscShuffleMode,
    typesize: usize,
    compressor: BloscCompressor,
    blocksize: usize,
) -> Result<Vec<u8>, BloscError> {
    let destsize = src.len() + BLOSC_MAX_OVERHEAD as usize;
    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let destsize = unsafe {
        blosc_compress_ctx(
            c_int::from(clevel.0),
            shuffle.as_c_int(),
            typesize.max(1),
            src.len(),
            src.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            compressor.as_cstr().cast::<c_char>(),
            blocksize,
            1,
        )
    };
    if destsize > 0 {
        unsafe {
            #[allow(clippy::cast_sign_loss)]
            dest.set_len(destsize as usize);
        }
        dest.shrink_to_fit();
        Ok(dest)
    } else {
        Err(BloscError::from(format!(
            "blosc_compress_ctx(clevel: {}, shuffle: {shuffle:?}, typesize: {typesize}, nbytes: {}) failed",
            clevel.0,
            src.len()
        )))
    }
}

/// Returns the uncompressed size of a valid blosc buffer.
fn blosc_validate(src: &[u8]) -> Option<usize> {
    let mut destsize: usize = 0;
    let valid = unsafe {
        blosc_cbuffer_validate(
            src.as_ptr().cast::<c_void>(),
            src.len(),
            std::ptr::addr_of_mut!(destsize),
        )
    } == 0;
    valid.then_some(destsize)
}

fn blosc_decompress_bytes(src: &[u8], destsize: usize) -> Result<Vec<u8>, BloscError> {
    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let destsize = unsafe {
        blosc_decompress_ctx(
            src.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            1,
        )
    };
    if destsize > 0 {
        unsafe {
            #[allow(clippy::cast_sign_loss)]
            dest.set_len(destsize as usize);
        }
        dest.shrink_to_fit();
        Ok(dest)
    } else {
        Err(BloscError::from("blosc_decompress_ctx failed"))
    }
}

impl CodecTraits for BloscCodec {
    fn create_metadata(&self) -> Metadata {
        Metadata::new_with_serializable_configuration(IDENTIFIER, &self.configuration).unwrap()
    }
}

impl BytesToBytesCodecTraits for BloscCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        decoded_representation
            .size()
            .map_or(BytesRepresentation::UnboundedSize, |size| {
                BytesRepresentation::BoundedSize(size + u64::from(BLOSC_MAX_OVERHEAD))
            })
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        blosc_compress_bytes(
            &decoded_value,
            self.configuration.clevel,
            self.configuration.shuffle,
            self.configuration.typesize.unwrap_or(1),
            self.configuration.cname,
            self.configuration.blocksize,
        )
        .map_err(|err| CodecError::Other(err.to_string()))
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let destsize = blosc_validate(&encoded_value)
            .ok_or_else(|| CodecError::Other("the blosc buffer is invalid".to_string()))?;
        blosc_decompress_bytes(&encoded_value, destsize)
            .map_err(|err| CodecError::Other(err.to_string()))
    }

    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &BytesRepresentation,
    ) -> Arc<dyn BytesPartialDecoderTraits> {
        Arc::new(BloscPartialDecoder {
            codec: self,
            input_handle,
            decoded_representation: *decoded_representation,
        })
    }
}

/// Partial decoder for the `blosc` codec.
///
/// Decodes the entire buffer and extracts the requested ranges.
struct BloscPartialDecoder {
    codec: Arc<BloscCodec>,
    input_handle: Arc<dyn BytesPartialDecoderTraits>,
    decoded_representation: BytesRepresentation,
}

#[async_trait]
impl BytesPartialDecoderTraits for BloscPartialDecoder {
    async fn partial_decode(
        &self,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
        let Some(encoded) = self.input_handle.decode().await? else {
            return Ok(None);
        };
        let decoded = self.codec.decode(encoded, &self.decoded_representation)?;
        Ok(Some(extract_byte_ranges(&decoded, byte_ranges)?))
    }
}
