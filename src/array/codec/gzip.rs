//! The `gzip` bytes to bytes codec.

use std::{
    io::{Cursor, Read},
    sync::Arc,
};

use async_trait::async_trait;
use flate2::bufread::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};

use crate::{
    array::BytesRepresentation,
    byte_range::{extract_byte_ranges, ByteRange},
    metadata::Metadata,
};

use super::{
    BytesPartialDecoderTraits, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecTraits,
};

/// The identifier of the `gzip` codec.
pub const IDENTIFIER: &str = "gzip";

/// A gzip compression level: an integer from 0 (no compression) to 9 (most compression).
#[derive(Serialize, Copy, Clone, Eq, PartialEq, Debug)]
pub struct GzipCompressionLevel(u32);

impl TryFrom<u32> for GzipCompressionLevel {
    type Error = u32;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        if level <= 9 {
            Ok(Self(level))
        } else {
            Err(level)
        }
    }
}

impl<'de> serde::Deserialize<'de> for GzipCompressionLevel {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = u32::deserialize(d)?;
        if level <= 9 {
            Ok(Self(level))
        } else {
            Err(serde::de::Error::custom("level must be between 0 and 9"))
        }
    }
}

impl GzipCompressionLevel {
    /// The compression level as a [`u32`].
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Configuration parameters for the `gzip` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct GzipCodecConfiguration {
    /// The compression level.
    pub level: GzipCompressionLevel,
}

/// A `gzip` codec implementation.
#[derive(Clone, Copy, Debug)]
pub struct GzipCodec {
    compression_level: GzipCompressionLevel,
}

impl GzipCodec {
    /// Create a new `gzip` codec.
    ///
    /// # Errors
    ///
    /// Errors if `compression_level` is not between 0 and 9.
    pub fn new(compression_level: u32) -> Result<Self, CodecCreateError> {
        let compression_level: GzipCompressionLevel = compression_level
            .try_into()
            .map_err(|level| CodecCreateError::Other(format!("invalid gzip level {level}")))?;
        Ok(Self { compression_level })
    }

    /// Create a new `gzip` codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if the configuration is invalid.
    pub fn new_with_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        let configuration: GzipCodecConfiguration = metadata.to_configuration()?;
        Ok(Self {
            compression_level: configuration.level,
        })
    }
}

impl CodecTraits for GzipCodec {
    fn create_metadata(&self) -> Metadata {
        let configuration = GzipCodecConfiguration {
            level: self.compression_level,
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).unwrap()
    }
}

impl BytesToBytesCodecTraits for GzipCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        decoded_representation.size().map_or(
            BytesRepresentation::UnboundedSize,
            |size| {
                // A gzip stream: header and trailer plus deflate block overhead.
                const HEADER_TRAILER_OVERHEAD: u64 = 10 + 8;
                const BLOCK_SIZE: u64 = 32768;
                const BLOCK_OVERHEAD: u64 = 5;
                let blocks_overhead = BLOCK_OVERHEAD * size.div_ceil(BLOCK_SIZE).max(1);
                BytesRepresentation::BoundedSize(size + HEADER_TRAILER_OVERHEAD + blocks_overhead)
            },
        )
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
            Cursor::new(decoded_value),
            flate2::Compression::new(self.compression_level.as_u32()),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &BytesRepresentation,
    ) -> Arc<dyn BytesPartialDecoderTraits> {
        Arc::new(GzipPartialDecoder {
            codec: self,
            input_handle,
            decoded_representation: *decoded_representation,
        })
    }
}

/// Partial decoder for the `gzip` codec.
///
/// Decodes the entire stream and extracts the requested ranges.
struct GzipPartialDecoder {
    codec: Arc<GzipCodec>,
    input_handle: Arc<dyn BytesPartialDecoderTraits>,
    decoded_representation: BytesRepresentation,
}

#[async_trait]
impl BytesPartialDecoderTraits for GzipPartialDecoder {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_roundtrip() {
        let codec = GzipCodec::new(5).unwrap();
        let bytes: Vec<u8> = (0..64).map(|i| i % 7).collect();
        let encoded = codec.encode(bytes.clone()).unwrap();
        let decoded = codec
            .decode(encoded, &BytesRepresentation::FixedSize(bytes.len() as u64))
            .unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn gzip_invalid_level() {
        assert!(GzipCodec::new(10).is_err());
        assert!(serde_json::from_str::<GzipCodecConfiguration>(r#"{"level":10}"#).is_err());
    }

    #[tokio::test]
    async fn gzip_partial_decode() {
        let codec = Arc::new(GzipCodec::new(1).unwrap());
        let bytes: Vec<u8> = (0..32).collect();
        let encoded = codec.encode(bytes.clone()).unwrap();
        let representation = BytesRepresentation::FixedSize(bytes.len() as u64);
        let input = Arc::new(super::super::BytesPartialDecoderCache::new(Some(encoded)));
        let decoder = codec.partial_decoder(input, &representation);
        let decoded = decoder
            .partial_decode(&[ByteRange::Interval(4, 4)])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decoded, vec![vec![4, 5, 6, 7]]);
    }
}
