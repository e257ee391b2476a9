//! The `bytes` array to bytes codec.
//!
//! Serialises a chunk in row-major order with an explicit endianness.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    array::{BytesRepresentation, ChunkRepresentation, DataType, Endianness},
    metadata::Metadata,
    selection::ArraySelection,
};

use super::{
    ArrayPartialDecoderTraits, ArrayToBytesCodecTraits, BytesPartialDecoderTraits,
    CodecCreateError, CodecError, CodecTraits,
};

/// The identifier of the `bytes` codec.
pub const IDENTIFIER: &str = "bytes";

/// Configuration parameters for the `bytes` codec.
#[derive(Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct BytesCodecConfiguration {
    /// The endianness of the serialised elements.
    ///
    /// Optional because single-byte data types have no endianness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endian: Option<Endianness>,
}

/// A `bytes` codec implementation.
#[derive(Clone, Copy, Debug)]
pub struct BytesCodec {
    endian: Option<Endianness>,
}

impl Default for BytesCodec {
    fn default() -> Self {
        Self::new(Some(crate::array::NATIVE_ENDIAN))
    }
}

impl BytesCodec {
    /// Create a new `bytes` codec.
    ///
    /// `endian` is optional because a single-byte data type has no endianness.
    #[must_use]
    pub const fn new(endian: Option<Endianness>) -> Self {
        Self { endian }
    }

    /// Create a new `bytes` codec for little endian data.
    #[must_use]
    pub const fn little() -> Self {
        Self::new(Some(Endianness::Little))
    }

    /// Create a new `bytes` codec for big endian data.
    #[must_use]
    pub const fn big() -> Self {
        Self::new(Some(Endianness::Big))
    }

    /// Create a new `bytes` codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if the configuration is invalid.
    pub fn new_with_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        let configuration: BytesCodecConfiguration = metadata.to_configuration()?;
        Ok(Self::new(configuration.endian))
    }

    fn do_encode_or_decode(
        &self,
        mut value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        if value.len() as u64 != decoded_representation.size() {
            return Err(CodecError::UnexpectedChunkDecodedSize(
                value.len(),
                decoded_representation.size(),
            ));
        }
        if decoded_representation.element_size() > 1 && self.endian.is_none() {
            return Err(CodecError::Other(format!(
                "cannot encode or decode a data type with element size {} with unspecified endianness",
                decoded_representation.element_size()
            )));
        }

        if let Some(endian) = self.endian {
            if !endian.is_native() {
                reverse_endianness(&mut value, decoded_representation.data_type());
            }
        }
        Ok(value)
    }
}

impl CodecTraits for BytesCodec {
    fn create_metadata(&self) -> Metadata {
        let configuration = BytesCodecConfiguration {
            endian: self.endian,
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).unwrap()
    }
}

impl ArrayToBytesCodecTraits for BytesCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError> {
        Ok(BytesRepresentation::FixedSize(decoded_representation.size()))
    }

    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        self.do_encode_or_decode(decoded_value, decoded_representation)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        self.do_encode_or_decode(encoded_value, decoded_representation)
    }

    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Arc<dyn ArrayPartialDecoderTraits>, CodecError> {
        Ok(Arc::new(BytesPartialDecoder {
            input_handle,
            decoded_representation: decoded_representation.clone(),
            endian: self.endian,
        }))
    }
}

/// Partial decoder for the `bytes` codec.
///
/// Requests only the byte ranges backing the selected elements.
struct BytesPartialDecoder {
    input_handle: Arc<dyn BytesPartialDecoderTraits>,
    decoded_representation: ChunkRepresentation,
    endian: Option<Endianness>,
}

#[async_trait]
impl ArrayPartialDecoderTraits for BytesPartialDecoder {
    async fn partial_decode(&self, selection: &ArraySelection) -> Result<Vec<u8>, CodecError> {
        let chunk_shape = self.decoded_representation.shape_u64();
        let element_size = self.decoded_representation.element_size();
        if !selection.is_within(&chunk_shape) {
            return Err(CodecError::Other(format!(
                "selection {selection} is not within chunk shape {chunk_shape:?}"
            )));
        }

        let byte_ranges = selection.byte_ranges(&chunk_shape, element_size);
        let Some(parts) = self.input_handle.partial_decode(&byte_ranges).await? else {
            // Missing chunk: the selection has the fill value.
            return Ok(self
                .decoded_representation
                .fill_value()
                .all_elements(selection.num_elements_usize()));
        };

        let mut bytes = Vec::with_capacity(selection.num_elements_usize() * element_size);
        for part in parts {
            bytes.extend_from_slice(&part);
        }
        if let Some(endian) = self.endian {
            if !endian.is_native() {
                reverse_endianness(&mut bytes, self.decoded_representation.data_type());
            }
        }
        Ok(bytes)
    }
}

/// Reverse the endianness of every element of `bytes` in place.
pub(crate) fn reverse_endianness(bytes: &mut [u8], data_type: &DataType) {
    let component_size = match data_type {
        DataType::Complex64 | DataType::Complex128 => data_type.size() / 2,
        // Single bytes and opaque byte strings have no endianness.
        DataType::Bool | DataType::Int8 | DataType::UInt8 | DataType::RawBits(_) => return,
        _ => data_type.size(),
    };
    for element in bytes.chunks_exact_mut(component_size) {
        element.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::FillValue;

    fn representation() -> ChunkRepresentation {
        ChunkRepresentation::new(
            vec![2, 2].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(0u16),
        )
    }

    #[test]
    fn bytes_roundtrip_little() {
        let codec = BytesCodec::little();
        let bytes: Vec<u8> = vec![1, 0, 2, 0, 3, 0, 4, 0];
        let encoded = ArrayToBytesCodecTraits::encode(&codec, bytes.clone(), &representation()).unwrap();
        let decoded = ArrayToBytesCodecTraits::decode(&codec, encoded, &representation()).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn bytes_big_endian_swaps() {
        let codec = BytesCodec::big();
        let elements: Vec<u16> = vec![1, 2, 3, 4];
        let native: Vec<u8> = elements.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let encoded = ArrayToBytesCodecTraits::encode(&codec, native.clone(), &representation()).unwrap();
        let expected: Vec<u8> = elements.iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(encoded, expected);
        let decoded = ArrayToBytesCodecTraits::decode(&codec, encoded, &representation()).unwrap();
        assert_eq!(decoded, native);
    }

    #[test]
    fn bytes_wrong_size_errors() {
        let codec = BytesCodec::little();
        assert!(ArrayToBytesCodecTraits::encode(&codec, vec![0; 3], &representation()).is_err());
    }

    #[test]
    fn bytes_endianness_required_for_multibyte() {
        let codec = BytesCodec::new(None);
        assert!(ArrayToBytesCodecTraits::encode(&codec, vec![0; 8], &representation()).is_err());
    }

    #[tokio::test]
    async fn bytes_partial_decode() {
        let representation = representation();
        let elements: Vec<u16> = vec![1, 2, 3, 4];
        let bytes: Vec<u8> = elements.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let input = Arc::new(super::super::BytesPartialDecoderCache::new(Some(bytes)));
        let decoder = Arc::new(BytesCodec::new(Some(crate::array::NATIVE_ENDIAN)))
            .partial_decoder(input, &representation)
            .unwrap();
        // Second column.
        let selection = ArraySelection::new_with_ranges(&[0..2, 1..2]);
        let decoded = decoder.partial_decode(&selection).await.unwrap();
        assert_eq!(decoded, [2u16.to_ne_bytes(), 4u16.to_ne_bytes()].concat());
    }
}
