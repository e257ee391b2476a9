//! The `sharding_indexed` array to bytes codec.
//!
//! Sharding splits a chunk (the shard) into inner chunks that are encoded by
//! their own codec pipeline and can be accessed individually.
//! A shard index maps each inner chunk coordinate to an `(offset, nbytes)`
//! pair within the shard; `(u64::MAX, u64::MAX)` entries denote inner chunks
//! that are entirely the fill value and are not stored.
//! The index itself is encoded by a configured codec pipeline and placed at
//! the start or end of the shard.
//!
//! The partial decoder reads the index and then only the byte ranges of the
//! inner chunks a selection touches.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    array::{BytesRepresentation, ChunkRepresentation, ChunkShape, DataType, FillValue},
    byte_range::ByteRange,
    indexer::Indexer,
    metadata::Metadata,
    selection::ArraySelection,
};

use super::{
    ArrayPartialDecoderTraits, ArrayToBytesCodecTraits, BytesPartialDecoderTraits, CodecChain,
    CodecCreateError, CodecError, CodecTraits,
};

/// The identifier of the `sharding_indexed` codec.
pub const IDENTIFIER: &str = "sharding_indexed";

/// The index entry denoting an inner chunk that is not stored.
const EMPTY_ENTRY: u64 = u64::MAX;

/// The location of the shard index within a shard.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShardingIndexLocation {
    /// The index is at the start of the shard.
    Start,
    /// The index is at the end of the shard.
    #[default]
    End,
}

/// Configuration parameters for the `sharding_indexed` codec.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ShardingCodecConfiguration {
    /// The shape of the inner chunks.
    pub chunk_shape: ChunkShape,
    /// The codec pipeline of the inner chunks.
    pub codecs: Vec<Metadata>,
    /// The codec pipeline of the shard index.
    pub index_codecs: Vec<Metadata>,
    /// The location of the shard index.
    #[serde(default)]
    pub index_location: ShardingIndexLocation,
}

/// A `sharding_indexed` codec implementation.
#[derive(Clone, Debug)]
pub struct ShardingCodec {
    chunk_shape: ChunkShape,
    inner_codecs: Arc<CodecChain>,
    index_codecs: Arc<CodecChain>,
    index_location: ShardingIndexLocation,
}

impl ShardingCodec {
    /// Create a new `sharding_indexed` codec.
    #[must_use]
    pub fn new(
        chunk_shape: ChunkShape,
        inner_codecs: CodecChain,
        index_codecs: CodecChain,
        index_location: ShardingIndexLocation,
    ) -> Self {
        Self {
            chunk_shape,
            inner_codecs: Arc::new(inner_codecs),
            index_codecs: Arc::new(index_codecs),
            index_location,
        }
    }

    /// Create a new `sharding_indexed` codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if the configuration or a sub-pipeline
    /// is invalid.
    pub fn new_with_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        let configuration: ShardingCodecConfiguration = metadata.to_configuration()?;
        Ok(Self::new(
            configuration.chunk_shape,
            CodecChain::from_metadata(&configuration.codecs)?,
            CodecChain::from_metadata(&configuration.index_codecs)?,
            configuration.index_location,
        ))
    }

    /// The number of inner chunks per shard axis.
    fn chunks_per_shard(&self, shard_shape: &[u64]) -> Result<Vec<u64>, CodecError> {
        let chunk_shape = self.chunk_shape.to_array_shape();
        if chunk_shape.len() != shard_shape.len() {
            return Err(CodecError::Other(format!(
                "inner chunk shape {chunk_shape:?} is incompatible with shard shape {shard_shape:?}"
            )));
        }
        std::iter::zip(shard_shape, &chunk_shape)
            .map(|(&shard, &chunk)| {
                if shard.is_multiple_of(chunk) {
                    Ok(shard / chunk)
                } else {
                    Err(CodecError::Other(format!(
                        "inner chunk shape {chunk_shape:?} must evenly divide shard shape {shard_shape:?}"
                    )))
                }
            })
            .collect()
    }

    fn inner_representation(
        &self,
        shard_representation: &ChunkRepresentation,
    ) -> ChunkRepresentation {
        ChunkRepresentation::new(
            self.chunk_shape.clone(),
            shard_representation.data_type().clone(),
            shard_representation.fill_value().clone(),
        )
    }

    fn index_representation(chunks_per_shard: &[u64]) -> ChunkRepresentation {
        let mut index_shape = Vec::with_capacity(chunks_per_shard.len() + 1);
        index_shape.extend_from_slice(chunks_per_shard);
        index_shape.push(2);
        ChunkRepresentation::new(
            index_shape.try_into().expect("index shape is non-zero"),
            DataType::UInt64,
            FillValue::from(EMPTY_ENTRY),
        )
    }

    fn index_encoded_size(&self, chunks_per_shard: &[u64]) -> Result<u64, CodecError> {
        let index_representation = Self::index_representation(chunks_per_shard);
        match self.index_codecs.compute_encoded_size(&index_representation)? {
            BytesRepresentation::FixedSize(size) => Ok(size),
            _ => Err(CodecError::Other(
                "the shard index pipeline must have a fixed encoded size".to_string(),
            )),
        }
    }

    fn decode_index(
        &self,
        encoded_index: Vec<u8>,
        chunks_per_shard: &[u64],
    ) -> Result<Vec<u64>, CodecError> {
        let index_representation = Self::index_representation(chunks_per_shard);
        let decoded = self
            .index_codecs
            .decode(encoded_index, &index_representation)?;
        Ok(decoded
            .chunks_exact(core::mem::size_of::<u64>())
            .map(|bytes| u64::from_ne_bytes(bytes.try_into().unwrap()))
            .collect())
    }
}

/// The linearised (row-major) index of an inner chunk within a shard.
fn inner_chunk_index(chunk_indices: &[u64], chunks_per_shard: &[u64]) -> usize {
    let mut index = 0;
    for (chunk_index, count) in std::iter::zip(chunk_indices, chunks_per_shard) {
        index = index * count + chunk_index;
    }
    usize::try_from(index).unwrap_or_default()
}

impl CodecTraits for ShardingCodec {
    fn create_metadata(&self) -> Metadata {
        let configuration = ShardingCodecConfiguration {
            chunk_shape: self.chunk_shape.clone(),
            codecs: self.inner_codecs.create_metadatas(),
            index_codecs: self.index_codecs.create_metadatas(),
            index_location: self.index_location,
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).unwrap()
    }
}

impl ArrayToBytesCodecTraits for ShardingCodec {
    fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError> {
        let chunks_per_shard = self.chunks_per_shard(&decoded_representation.shape_u64())?;
        let index_size = self.index_encoded_size(&chunks_per_shard)?;
        let num_inner: u64 = chunks_per_shard.iter().product();
        let inner_representation = self.inner_representation(decoded_representation);
        match self.inner_codecs.compute_encoded_size(&inner_representation)? {
            BytesRepresentation::FixedSize(size) | BytesRepresentation::BoundedSize(size) => {
                Ok(BytesRepresentation::BoundedSize(
                    index_size + num_inner * size,
                ))
            }
            BytesRepresentation::UnboundedSize => Ok(BytesRepresentation::UnboundedSize),
        }
    }

    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let shard_shape = decoded_representation.shape_u64();
        let element_size = decoded_representation.element_size();
        if decoded_value.len() as u64 != decoded_representation.size() {
            return Err(CodecError::UnexpectedChunkDecodedSize(
                decoded_value.len(),
                decoded_representation.size(),
            ));
        }

        let chunks_per_shard = self.chunks_per_shard(&shard_shape)?;
        let index_encoded_size = self.index_encoded_size(&chunks_per_shard)?;
        let num_inner: usize = usize::try_from(chunks_per_shard.iter().product::<u64>())
            .map_err(|err| CodecError::Other(err.to_string()))?;
        let inner_representation = self.inner_representation(decoded_representation);
        let fill_value = decoded_representation.fill_value();

        let offset_base = match self.index_location {
            ShardingIndexLocation::Start => index_encoded_size,
            ShardingIndexLocation::End => 0,
        };

        let mut shard_index = vec![EMPTY_ENTRY; num_inner * 2];
        let mut shard_body: Vec<u8> = Vec::new();
        let indexer = Indexer::new(
            &ArraySelection::full(&shard_shape),
            &self.chunk_shape.to_array_shape(),
        )?;
        for (chunk, projection) in indexer.enumerate() {
            let inner_bytes =
                projection
                    .out_selection
                    .extract_from(&decoded_value, &shard_shape, element_size)?;
            if fill_value.equals_all(&inner_bytes) {
                continue;
            }
            let encoded_inner = self.inner_codecs.encode(inner_bytes, &inner_representation)?;
            shard_index[chunk * 2] = offset_base + shard_body.len() as u64;
            shard_index[chunk * 2 + 1] = encoded_inner.len() as u64;
            shard_body.extend_from_slice(&encoded_inner);
        }

        let index_bytes: Vec<u8> = shard_index
            .iter()
            .flat_map(|entry| entry.to_ne_bytes())
            .collect();
        let encoded_index = self
            .index_codecs
            .encode(index_bytes, &Self::index_representation(&chunks_per_shard))?;

        let mut shard =
            Vec::with_capacity(shard_body.len() + usize::try_from(index_encoded_size).unwrap_or_default());
        match self.index_location {
            ShardingIndexLocation::Start => {
                shard.extend_from_slice(&encoded_index);
                shard.extend_from_slice(&shard_body);
            }
            ShardingIndexLocation::End => {
                shard.extend_from_slice(&shard_body);
                shard.extend_from_slice(&encoded_index);
            }
        }
        Ok(shard)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let shard_shape = decoded_representation.shape_u64();
        let element_size = decoded_representation.element_size();
        let chunks_per_shard = self.chunks_per_shard(&shard_shape)?;
        let index_encoded_size = usize::try_from(self.index_encoded_size(&chunks_per_shard)?)
            .map_err(|err| CodecError::Other(err.to_string()))?;

        if encoded_value.len() < index_encoded_size {
            return Err(CodecError::Other(format!(
                "the shard is smaller ({}) than its index ({index_encoded_size})",
                encoded_value.len()
            )));
        }
        let encoded_index = match self.index_location {
            ShardingIndexLocation::Start => encoded_value[..index_encoded_size].to_vec(),
            ShardingIndexLocation::End => {
                encoded_value[encoded_value.len() - index_encoded_size..].to_vec()
            }
        };
        let shard_index = self.decode_index(encoded_index, &chunks_per_shard)?;
        let inner_representation = self.inner_representation(decoded_representation);

        let mut shard = decoded_representation
            .fill_value()
            .all_elements(usize::try_from(decoded_representation.num_elements()).unwrap_or_default());
        let indexer = Indexer::new(
            &ArraySelection::full(&shard_shape),
            &self.chunk_shape.to_array_shape(),
        )?;
        for (chunk, projection) in indexer.enumerate() {
            let offset = shard_index[chunk * 2];
            let nbytes = shard_index[chunk * 2 + 1];
            if offset == EMPTY_ENTRY && nbytes == EMPTY_ENTRY {
                continue;
            }
            let offset = usize::try_from(offset).map_err(|err| CodecError::Other(err.to_string()))?;
            let nbytes = usize::try_from(nbytes).map_err(|err| CodecError::Other(err.to_string()))?;
            if offset + nbytes > encoded_value.len() {
                return Err(CodecError::Other(
                    "a shard index entry exceeds the shard length".to_string(),
                ));
            }
            let inner_bytes = self.inner_codecs.decode(
                encoded_value[offset..offset + nbytes].to_vec(),
                &inner_representation,
            )?;
            projection.out_selection.store_into(
                &inner_bytes,
                &mut shard,
                &shard_shape,
                element_size,
            )?;
        }
        Ok(shard)
    }

    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Arc<dyn ArrayPartialDecoderTraits>, CodecError> {
        Ok(Arc::new(ShardingPartialDecoder {
            codec: self,
            input_handle,
            decoded_representation: decoded_representation.clone(),
        }))
    }
}

/// Partial decoder for the `sharding_indexed` codec.
///
/// Reads the shard index, then only the inner chunks the selection touches.
struct ShardingPartialDecoder {
    codec: Arc<ShardingCodec>,
    input_handle: Arc<dyn BytesPartialDecoderTraits>,
    decoded_representation: ChunkRepresentation,
}

impl ShardingPartialDecoder {
    /// Read and decode the shard index, or [`None`] if the shard is missing.
    async fn read_index(&self, chunks_per_shard: &[u64]) -> Result<Option<Vec<u64>>, CodecError> {
        let index_encoded_size = self.codec.index_encoded_size(chunks_per_shard)?;
        let index_range = match self.codec.index_location {
            ShardingIndexLocation::Start => ByteRange::Interval(0, index_encoded_size),
            ShardingIndexLocation::End => ByteRange::Suffix(index_encoded_size),
        };
        let Some(mut encoded_index) = self.input_handle.partial_decode(&[index_range]).await?
        else {
            return Ok(None);
        };
        let encoded_index = encoded_index.remove(0);
        Ok(Some(self.codec.decode_index(encoded_index, chunks_per_shard)?))
    }
}

#[async_trait]
impl ArrayPartialDecoderTraits for ShardingPartialDecoder {
    async fn partial_decode(&self, selection: &ArraySelection) -> Result<Vec<u8>, CodecError> {
        let shard_shape = self.decoded_representation.shape_u64();
        let element_size = self.decoded_representation.element_size();
        if !selection.is_within(&shard_shape) {
            return Err(CodecError::Other(format!(
                "selection {selection} is not within shard shape {shard_shape:?}"
            )));
        }
        let chunks_per_shard = self.codec.chunks_per_shard(&shard_shape)?;
        let fill_value = self.decoded_representation.fill_value();

        let mut out = fill_value.all_elements(selection.num_elements_usize());
        let Some(shard_index) = self.read_index(&chunks_per_shard).await? else {
            // Missing shard: the selection has the fill value.
            return Ok(out);
        };

        let out_shape = selection.shape();
        let inner_shape = self.codec.chunk_shape.to_array_shape();
        let inner_representation = self.codec.inner_representation(&self.decoded_representation);
        for projection in Indexer::new(selection, &inner_shape)? {
            let chunk = inner_chunk_index(&projection.chunk_indices, &chunks_per_shard);
            let offset = shard_index[chunk * 2];
            let nbytes = shard_index[chunk * 2 + 1];
            if offset == EMPTY_ENTRY && nbytes == EMPTY_ENTRY {
                continue;
            }
            let Some(mut encoded_inner) = self
                .input_handle
                .partial_decode(&[ByteRange::Interval(offset, nbytes)])
                .await?
            else {
                continue;
            };
            let inner_bytes = self
                .codec
                .inner_codecs
                .decode(encoded_inner.remove(0), &inner_representation)?;
            let block =
                projection
                    .chunk_selection
                    .extract_from(&inner_bytes, &inner_shape, element_size)?;
            projection
                .out_selection
                .store_into(&block, &mut out, &out_shape, element_size)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::codec::BytesCodec;

    fn sharding_codec(inner_shape: Vec<u64>) -> ShardingCodec {
        let inner_codecs = CodecChain::new(vec![crate::array::codec::Codec::ArrayToBytes(
            Arc::new(BytesCodec::little()),
        )])
        .unwrap();
        let index_codecs = CodecChain::new(vec![crate::array::codec::Codec::ArrayToBytes(
            Arc::new(BytesCodec::little()),
        )])
        .unwrap();
        ShardingCodec::new(
            inner_shape.try_into().unwrap(),
            inner_codecs,
            index_codecs,
            ShardingIndexLocation::End,
        )
    }

    fn shard_representation() -> ChunkRepresentation {
        ChunkRepresentation::new(
            vec![8].try_into().unwrap(),
            DataType::UInt8,
            FillValue::from(0u8),
        )
    }

    #[test]
    fn sharding_roundtrip() {
        let codec = sharding_codec(vec![2]);
        let representation = shard_representation();
        let bytes = vec![0, 0, 0, 0, 5, 6, 0, 0];
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        let decoded = codec.decode(encoded, &representation).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn sharding_empty_inner_chunks_not_stored() {
        let codec = sharding_codec(vec![2]);
        let representation = shard_representation();
        let bytes = vec![0, 0, 0, 0, 5, 6, 0, 0];
        let encoded = codec.encode(bytes, &representation).unwrap();
        // 4 inner chunks, index of 8 u64 at the end; only inner chunk 2 stored.
        let index_bytes = &encoded[encoded.len() - 64..];
        let index: Vec<u64> = index_bytes
            .chunks_exact(8)
            .map(|bytes| u64::from_le_bytes(bytes.try_into().unwrap()))
            .collect();
        assert_eq!(encoded.len(), 2 + 64);
        assert_eq!(index[0..2], [EMPTY_ENTRY, EMPTY_ENTRY]);
        assert_eq!(index[2..4], [EMPTY_ENTRY, EMPTY_ENTRY]);
        assert_eq!(index[4..6], [0, 2]);
        assert_eq!(index[6..8], [EMPTY_ENTRY, EMPTY_ENTRY]);
    }

    #[test]
    fn sharding_indivisible_inner_shape() {
        let codec = sharding_codec(vec![3]);
        let representation = shard_representation();
        assert!(codec.encode(vec![0; 8], &representation).is_err());
    }

    #[tokio::test]
    async fn sharding_partial_decode() {
        let codec = Arc::new(sharding_codec(vec![2]));
        let representation = shard_representation();
        let bytes = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let encoded = codec.encode(bytes, &representation).unwrap();
        let input = Arc::new(super::super::BytesPartialDecoderCache::new(Some(encoded)));
        let decoder = codec.partial_decoder(input, &representation).unwrap();
        let decoded = decoder
            .partial_decode(&ArraySelection::new_with_ranges(&[3..7]))
            .await
            .unwrap();
        assert_eq!(decoded, vec![4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn sharding_partial_decode_missing_shard() {
        let codec = Arc::new(sharding_codec(vec![2]));
        let representation = shard_representation();
        let input = Arc::new(super::super::BytesPartialDecoderCache::new(None));
        let decoder = codec.partial_decoder(input, &representation).unwrap();
        let decoded = decoder
            .partial_decode(&ArraySelection::new_with_ranges(&[0..8]))
            .await
            .unwrap();
        assert_eq!(decoded, vec![0; 8]);
    }
}
