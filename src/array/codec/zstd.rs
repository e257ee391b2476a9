//! The `zstd` bytes to bytes codec.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    array::BytesRepresentation,
    byte_range::{extract_byte_ranges, ByteRange},
    metadata::Metadata,
};

use super::{
    BytesPartialDecoderTraits, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecTraits,
};

/// The identifier of the `zstd` codec.
pub const IDENTIFIER: &str = "zstd";

/// Configuration parameters for the `zstd` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct ZstdCodecConfiguration {
    /// The compression level.
    pub level: i32,
    /// Whether a content checksum is appended to each frame.
    #[serde(default)]
    pub checksum: bool,
}

/// A `zstd` codec implementation.
#[derive(Clone, Copy, Debug)]
pub struct ZstdCodec {
    compression: i32,
    checksum: bool,
}

impl ZstdCodec {
    /// Create a new `zstd` codec.
    #[must_use]
    pub const fn new(compression: i32, checksum: bool) -> Self {
        Self {
            compression,
            checksum,
        }
    }

    /// Create a new `zstd` codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if the configuration is invalid.
    pub fn new_with_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        let configuration: ZstdCodecConfiguration = metadata.to_configuration()?;
        Ok(Self::new(configuration.level, configuration.checksum))
    }
}

impl CodecTraits for ZstdCodec {
    fn create_metadata(&self) -> Metadata {
        let configuration = ZstdCodecConfiguration {
            level: self.compression,
            checksum: self.checksum,
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).unwrap()
    }
}

impl BytesToBytesCodecTraits for ZstdCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        decoded_representation
            .size()
            .map_or(BytesRepresentation::UnboundedSize, |size| {
                // A worst case estimate of the zstd frame overhead.
                BytesRepresentation::BoundedSize(size + size / 100 + 64)
            })
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = zstd::Encoder::new(Vec::new(), self.compression)?;
        encoder.include_checksum(self.checksum)?;
        std::io::copy(&mut decoded_value.as_slice(), &mut encoder)?;
        Ok(encoder.finish()?)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(encoded_value.as_slice()).map_err(CodecError::from)
    }

    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &BytesRepresentation,
    ) -> Arc<dyn BytesPartialDecoderTraits> {
        Arc::new(ZstdPartialDecoder {
            codec: self,
            input_handle,
            decoded_representation: *decoded_representation,
        })
    }
}

/// Partial decoder for the `zstd` codec.
///
/// Decodes the entire stream and extracts the requested ranges.
struct ZstdPartialDecoder {
    codec: Arc<ZstdCodec>,
    input_handle: Arc<dyn BytesPartialDecoderTraits>,
    decoded_representation: BytesRepresentation,
}

#[async_trait]
impl BytesPartialDecoderTraits for ZstdPartialDecoder {
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
    fn zstd_roundtrip() {
        let codec = ZstdCodec::new(5, true);
        let bytes: Vec<u8> = (0..128).map(|i| i % 11).collect();
        let encoded = codec.encode(bytes.clone()).unwrap();
        let decoded = codec
            .decode(encoded, &BytesRepresentation::FixedSize(bytes.len() as u64))
            .unwrap();
        assert_eq!(decoded, bytes);
    }
}
