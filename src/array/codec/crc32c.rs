//! The `crc32c` checksum bytes to bytes codec.
//!
//! Appends a little-endian CRC32C checksum on encode; validates and strips it
//! on decode.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    array::BytesRepresentation, byte_range::ByteRange, config::global_config, metadata::Metadata,
};

use super::{
    BytesPartialDecoderTraits, BytesToBytesCodecTraits, CodecCreateError, CodecError, CodecTraits,
};

/// The identifier of the `crc32c` codec.
pub const IDENTIFIER: &str = "crc32c";

/// The size of the appended checksum in bytes.
pub const CHECKSUM_SIZE: usize = core::mem::size_of::<u32>();

/// A `crc32c` checksum codec implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32cCodec;

impl Crc32cCodec {
    /// Create a new `crc32c` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Create a new `crc32c` codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if the metadata has a non-empty configuration.
    pub fn new_with_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        if metadata.configuration_is_none_or_empty() {
            Ok(Self {})
        } else {
            Err(CodecCreateError::Other(
                "the crc32c codec takes no configuration".to_string(),
            ))
        }
    }
}

impl CodecTraits for Crc32cCodec {
    fn create_metadata(&self) -> Metadata {
        Metadata::new(IDENTIFIER)
    }
}

impl BytesToBytesCodecTraits for Crc32cCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation {
        match decoded_representation {
            BytesRepresentation::FixedSize(size) => {
                BytesRepresentation::FixedSize(size + CHECKSUM_SIZE as u64)
            }
            BytesRepresentation::BoundedSize(size) => {
                BytesRepresentation::BoundedSize(size + CHECKSUM_SIZE as u64)
            }
            BytesRepresentation::UnboundedSize => BytesRepresentation::UnboundedSize,
        }
    }

    fn encode(&self, mut decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let checksum = crc32c::crc32c(&decoded_value).to_le_bytes();
        decoded_value.reserve_exact(CHECKSUM_SIZE);
        decoded_value.extend_from_slice(&checksum);
        Ok(decoded_value)
    }

    fn decode(
        &self,
        mut encoded_value: Vec<u8>,
        _decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        if encoded_value.len() < CHECKSUM_SIZE {
            return Err(CodecError::Other(
                "crc32c decoder expects at least 4 bytes of input".to_string(),
            ));
        }
        if global_config().validate_checksums() {
            let payload = &encoded_value[..encoded_value.len() - CHECKSUM_SIZE];
            let checksum = crc32c::crc32c(payload).to_le_bytes();
            if checksum != encoded_value[encoded_value.len() - CHECKSUM_SIZE..] {
                return Err(CodecError::InvalidChecksum);
            }
        }
        encoded_value.truncate(encoded_value.len() - CHECKSUM_SIZE);
        Ok(encoded_value)
    }

    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        _decoded_representation: &BytesRepresentation,
    ) -> Arc<dyn BytesPartialDecoderTraits> {
        Arc::new(Crc32cPartialDecoder { input_handle })
    }
}

/// Partial decoder for the `crc32c` codec.
///
/// Requests ranges within the payload; checksum validation is skipped since
/// the whole value is not retrieved.
struct Crc32cPartialDecoder {
    input_handle: Arc<dyn BytesPartialDecoderTraits>,
}

#[async_trait]
impl BytesPartialDecoderTraits for Crc32cPartialDecoder {
    async fn partial_decode(
        &self,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
        // Adjust the ranges to avoid the trailing checksum.
        let inner_ranges: Vec<ByteRange> = byte_ranges
            .iter()
            .map(|byte_range| match byte_range {
                ByteRange::All | ByteRange::Interval(..) => *byte_range,
                ByteRange::Suffix(length) => ByteRange::Suffix(length + CHECKSUM_SIZE as u64),
            })
            .collect();
        let Some(mut parts) = self.input_handle.partial_decode(&inner_ranges).await? else {
            return Ok(None);
        };
        for (part, byte_range) in parts.iter_mut().zip(byte_ranges) {
            match byte_range {
                // The full value and suffix requests include the checksum.
                ByteRange::All | ByteRange::Suffix(_) => {
                    part.truncate(part.len().saturating_sub(CHECKSUM_SIZE));
                }
                ByteRange::Interval(..) => {}
            }
        }
        Ok(Some(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32c_roundtrip() {
        let codec = Crc32cCodec::new();
        let bytes: Vec<u8> = (0..16).collect();
        let encoded = codec.encode(bytes.clone()).unwrap();
        assert_eq!(encoded.len(), bytes.len() + CHECKSUM_SIZE);
        let decoded = codec
            .decode(encoded, &BytesRepresentation::FixedSize(bytes.len() as u64))
            .unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn crc32c_detects_corruption() {
        let codec = Crc32cCodec::new();
        let bytes: Vec<u8> = (0..16).collect();
        let mut encoded = codec.encode(bytes.clone()).unwrap();
        encoded[0] ^= 0xff;
        assert!(matches!(
            codec.decode(encoded, &BytesRepresentation::FixedSize(bytes.len() as u64)),
            Err(CodecError::InvalidChecksum)
        ));
    }

    #[tokio::test]
    async fn crc32c_partial_decode_skips_checksum() {
        let codec = Arc::new(Crc32cCodec::new());
        let bytes: Vec<u8> = (0..8).collect();
        let encoded = codec.encode(bytes.clone()).unwrap();
        let representation = BytesRepresentation::FixedSize(bytes.len() as u64);
        let input = Arc::new(super::super::BytesPartialDecoderCache::new(Some(encoded)));
        let decoder = codec.partial_decoder(input, &representation);
        let decoded = decoder
            .partial_decode(&[ByteRange::All, ByteRange::Suffix(2), ByteRange::Interval(1, 2)])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decoded[0], bytes);
        assert_eq!(decoded[1], vec![6, 7]);
        assert_eq!(decoded[2], vec![1, 2]);
    }
}
