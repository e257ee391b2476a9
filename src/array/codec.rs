//! Codecs.
//!
//! Chunks are encoded by an ordered pipeline of codecs, each a bidirectional
//! transform.
//! A codec maps an array to an array, an array to bytes, or bytes to bytes;
//! a valid pipeline is any number of `array->array` codecs, exactly one
//! `array->bytes` codec (the serialiser), then any number of
//! `bytes->bytes` codecs.
//! [`CodecChain`] validates that shape and drives encoding (forward) and
//! decoding (reverse).
//!
//! The codec set is closed: [`Codec::from_metadata`] maps codec names onto
//! the known implementations.
//!
//! Codecs also support partial decoding, where only the byte ranges backing
//! a requested region are retrieved from the store.
//! The entry point is a store-backed [`StoragePartialDecoder`]; the chain
//! wraps it codec by codec into an [`ArrayPartialDecoderTraits`] handle.
//! Compression codecs decode their entire input to serve a partial request,
//! whereas the `bytes` and `sharding_indexed` codecs request only what they
//! need, so partial decoding is transparent except for performance.

pub mod bytes;
#[cfg(feature = "transpose")]
pub mod transpose;

#[cfg(feature = "blosc")]
pub mod blosc;
#[cfg(feature = "crc32c")]
pub mod crc32c;
#[cfg(feature = "gzip")]
pub mod gzip;
#[cfg(feature = "zstd")]
pub mod zstd;

#[cfg(feature = "sharding")]
pub mod sharding;

pub use bytes::BytesCodec;
#[cfg(feature = "transpose")]
pub use transpose::TransposeCodec;

#[cfg(feature = "blosc")]
pub use blosc::BloscCodec;
#[cfg(feature = "crc32c")]
pub use crc32c::Crc32cCodec;
#[cfg(feature = "gzip")]
pub use gzip::GzipCodec;
#[cfg(feature = "zstd")]
pub use zstd::ZstdCodec;

#[cfg(feature = "sharding")]
pub use sharding::ShardingCodec;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    byte_range::{ByteRange, InvalidByteRangeError},
    metadata::{ConfigurationInvalidError, Metadata},
    selection::{ArraySelection, IncompatibleDimensionalityError},
    storage::{MaybeBytes, ReadableStorageTraits, StorageError, StoreKey},
};

use super::{BytesRepresentation, ChunkRepresentation};

/// A codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// A storage error, from partial decoding.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid byte range.
    #[error(transparent)]
    InvalidByteRangeError(#[from] InvalidByteRangeError),
    /// The decoded data does not match a stored checksum.
    #[error("the checksum is invalid")]
    InvalidChecksum,
    /// An unexpected chunk size.
    #[error("unexpected chunk size {0}, expected {1}")]
    UnexpectedChunkDecodedSize(usize, u64),
    /// An incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// A codec creation error.
#[derive(Debug, Error)]
pub enum CodecCreateError {
    /// The codec name is not recognised.
    #[error("codec {0} is not supported")]
    Unsupported(String),
    /// The codec configuration is invalid.
    #[error(transparent)]
    ConfigurationInvalid(#[from] ConfigurationInvalidError),
    /// The codec pipeline has an invalid shape.
    #[error("the codec pipeline must be array->array codecs, one array->bytes codec, then bytes->bytes codecs")]
    InvalidPipeline,
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

/// Traits common to all codecs.
pub trait CodecTraits: Send + Sync + core::fmt::Debug {
    /// The metadata of the codec: its name and configuration.
    fn create_metadata(&self) -> Metadata;
}

/// Traits for an `array->array` codec.
pub trait ArrayToArrayCodecTraits: CodecTraits {
    /// The representation of the encoded array given the representation of the decoded array.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the decoded representation is incompatible with the codec.
    fn encoded_representation(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<ChunkRepresentation, CodecError>;

    /// Encode an array of native-endian dense bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the codec fails or `decoded_value` is
    /// incompatible with `decoded_representation`.
    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decode an array of native-endian dense bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the codec fails.
    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError>;

    /// Create a partial decoder over `input_handle`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the partial decoder cannot be created.
    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn ArrayPartialDecoderTraits>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Arc<dyn ArrayPartialDecoderTraits>, CodecError>;
}

/// Traits for an `array->bytes` codec: the single serialiser of a pipeline.
pub trait ArrayToBytesCodecTraits: CodecTraits {
    /// The size of the encoded bytes given the representation of the decoded array.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the decoded representation is incompatible with the codec.
    fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError>;

    /// Encode an array of native-endian dense bytes into a byte string.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the codec fails or `decoded_value` is
    /// incompatible with `decoded_representation`.
    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decode a byte string into an array of native-endian dense bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the codec fails.
    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError>;

    /// Create a partial decoder over `input_handle`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the partial decoder cannot be created.
    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Arc<dyn ArrayPartialDecoderTraits>, CodecError>;
}

/// Traits for a `bytes->bytes` codec.
pub trait BytesToBytesCodecTraits: CodecTraits {
    /// The size of the encoded bytes given the size of the decoded bytes.
    fn compute_encoded_size(
        &self,
        decoded_representation: &BytesRepresentation,
    ) -> BytesRepresentation;

    /// Encode bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the codec fails.
    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the codec fails.
    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &BytesRepresentation,
    ) -> Result<Vec<u8>, CodecError>;

    /// Create a partial decoder over `input_handle`.
    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &BytesRepresentation,
    ) -> Arc<dyn BytesPartialDecoderTraits>;
}

/// Partial decoder of a byte string.
#[async_trait]
pub trait BytesPartialDecoderTraits: Send + Sync {
    /// Partially decode bytes.
    ///
    /// Returns [`None`] if the underlying store key is missing.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a codec fails or a byte range is invalid.
    async fn partial_decode(
        &self,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError>;

    /// Decode all bytes.
    ///
    /// Returns [`None`] if the underlying store key is missing.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a codec fails.
    async fn decode(&self) -> Result<MaybeBytes, CodecError> {
        Ok(self
            .partial_decode(&[ByteRange::All])
            .await?
            .map(|mut values| values.remove(0)))
    }
}

/// Partial decoder of an array.
///
/// A partial decode of a missing chunk returns the fill value.
#[async_trait]
pub trait ArrayPartialDecoderTraits: Send + Sync {
    /// Decode `selection` (in chunk-local coordinates) into a dense
    /// selection-shaped buffer of native-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a codec fails or the selection does not
    /// lie within the decoded representation.
    async fn partial_decode(&self, selection: &ArraySelection) -> Result<Vec<u8>, CodecError>;
}

/// A [`BytesPartialDecoderTraits`] implementation backed by a store key.
///
/// Byte ranges are fetched with
/// [`get_partial_values_key`](ReadableStorageTraits::get_partial_values_key);
/// stores without ranged reads transparently fall back to a full read.
#[derive(Debug)]
pub struct StoragePartialDecoder<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    key: StoreKey,
}

impl<TStorage: ?Sized> StoragePartialDecoder<TStorage> {
    /// Create a new storage partial decoder for `key`.
    pub fn new(storage: Arc<TStorage>, key: StoreKey) -> Self {
        Self { storage, key }
    }
}

#[async_trait]
impl<TStorage: ?Sized + ReadableStorageTraits> BytesPartialDecoderTraits
    for StoragePartialDecoder<TStorage>
{
    async fn partial_decode(
        &self,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
        Ok(self
            .storage
            .get_partial_values_key(&self.key, byte_ranges)
            .await?)
    }
}

/// A [`BytesPartialDecoderTraits`] implementation over bytes held in memory.
#[derive(Debug)]
pub struct BytesPartialDecoderCache {
    bytes: MaybeBytes,
}

impl BytesPartialDecoderCache {
    /// Create a new partial decoder cache over `bytes`.
    #[must_use]
    pub fn new(bytes: MaybeBytes) -> Self {
        Self { bytes }
    }
}

#[async_trait]
impl BytesPartialDecoderTraits for BytesPartialDecoderCache {
    async fn partial_decode(
        &self,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
        match &self.bytes {
            Some(bytes) => Ok(Some(crate::byte_range::extract_byte_ranges(
                bytes,
                byte_ranges,
            )?)),
            None => Ok(None),
        }
    }
}

/// A generic `array->array`, `array->bytes`, or `bytes->bytes` codec.
#[derive(Debug, Clone)]
pub enum Codec {
    /// An `array->array` codec.
    ArrayToArray(Arc<dyn ArrayToArrayCodecTraits>),
    /// An `array->bytes` codec.
    ArrayToBytes(Arc<dyn ArrayToBytesCodecTraits>),
    /// A `bytes->bytes` codec.
    BytesToBytes(Arc<dyn BytesToBytesCodecTraits>),
}

impl Codec {
    /// Create a codec from metadata.
    ///
    /// The set of known codecs is closed; this is the name to implementation
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns [`CodecCreateError::Unsupported`] if the name is not a known
    /// codec, or a [`CodecCreateError`] if its configuration is invalid.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        match metadata.name() {
            bytes::IDENTIFIER => Ok(Self::ArrayToBytes(Arc::new(
                BytesCodec::new_with_metadata(metadata)?,
            ))),
            #[cfg(feature = "transpose")]
            transpose::IDENTIFIER => Ok(Self::ArrayToArray(Arc::new(
                TransposeCodec::new_with_metadata(metadata)?,
            ))),
            #[cfg(feature = "gzip")]
            gzip::IDENTIFIER => Ok(Self::BytesToBytes(Arc::new(
                GzipCodec::new_with_metadata(metadata)?,
            ))),
            #[cfg(feature = "zstd")]
            zstd::IDENTIFIER => Ok(Self::BytesToBytes(Arc::new(
                ZstdCodec::new_with_metadata(metadata)?,
            ))),
            #[cfg(feature = "blosc")]
            blosc::IDENTIFIER => Ok(Self::BytesToBytes(Arc::new(
                BloscCodec::new_with_metadata(metadata)?,
            ))),
            #[cfg(feature = "crc32c")]
            crc32c::IDENTIFIER => Ok(Self::BytesToBytes(Arc::new(
                Crc32cCodec::new_with_metadata(metadata)?,
            ))),
            #[cfg(feature = "sharding")]
            sharding::IDENTIFIER => Ok(Self::ArrayToBytes(Arc::new(
                ShardingCodec::new_with_metadata(metadata)?,
            ))),
            name => Err(CodecCreateError::Unsupported(name.to_string())),
        }
    }
}

/// An ordered sequence of codecs of shape `array->array* array->bytes bytes->bytes*`.
///
/// A codec chain is itself an `array->bytes` transform over whole chunks.
#[derive(Debug, Clone)]
pub struct CodecChain {
    array_to_array: Vec<Arc<dyn ArrayToArrayCodecTraits>>,
    array_to_bytes: Arc<dyn ArrayToBytesCodecTraits>,
    bytes_to_bytes: Vec<Arc<dyn BytesToBytesCodecTraits>>,
}

impl CodecChain {
    /// Create a codec chain from a list of codecs.
    ///
    /// # Errors
    ///
    /// Returns [`CodecCreateError::InvalidPipeline`] if the codecs are not of
    /// the shape `array->array* array->bytes bytes->bytes*`.
    pub fn new(codecs: Vec<Codec>) -> Result<Self, CodecCreateError> {
        let mut array_to_array = Vec::new();
        let mut array_to_bytes = None;
        let mut bytes_to_bytes = Vec::new();
        for codec in codecs {
            match codec {
                Codec::ArrayToArray(codec) => {
                    if array_to_bytes.is_some() {
                        return Err(CodecCreateError::InvalidPipeline);
                    }
                    array_to_array.push(codec);
                }
                Codec::ArrayToBytes(codec) => {
                    if array_to_bytes.is_some() {
                        return Err(CodecCreateError::InvalidPipeline);
                    }
                    array_to_bytes = Some(codec);
                }
                Codec::BytesToBytes(codec) => {
                    if array_to_bytes.is_none() {
                        return Err(CodecCreateError::InvalidPipeline);
                    }
                    bytes_to_bytes.push(codec);
                }
            }
        }
        let array_to_bytes = array_to_bytes.ok_or(CodecCreateError::InvalidPipeline)?;
        Ok(Self {
            array_to_array,
            array_to_bytes,
            bytes_to_bytes,
        })
    }

    /// Create a codec chain from a list of codec metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if a codec is unsupported, a
    /// configuration is invalid, or the pipeline shape is invalid.
    pub fn from_metadata(metadatas: &[Metadata]) -> Result<Self, CodecCreateError> {
        let codecs = metadatas
            .iter()
            .map(Codec::from_metadata)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(codecs)
    }

    /// The metadata of the codecs in pipeline order.
    #[must_use]
    pub fn create_metadatas(&self) -> Vec<Metadata> {
        let mut metadatas =
            Vec::with_capacity(self.array_to_array.len() + 1 + self.bytes_to_bytes.len());
        for codec in &self.array_to_array {
            metadatas.push(codec.create_metadata());
        }
        metadatas.push(self.array_to_bytes.create_metadata());
        for codec in &self.bytes_to_bytes {
            metadatas.push(codec.create_metadata());
        }
        metadatas
    }

    /// The `array->bytes` codec of the chain.
    #[must_use]
    pub fn array_to_bytes_codec(&self) -> &Arc<dyn ArrayToBytesCodecTraits> {
        &self.array_to_bytes
    }

    /// The array representations before each `array->array` codec and before
    /// the `array->bytes` codec (the last entry).
    fn array_representations(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<ChunkRepresentation>, CodecError> {
        let mut representations = Vec::with_capacity(self.array_to_array.len() + 1);
        let mut last = decoded_representation.clone();
        for codec in &self.array_to_array {
            let next = codec.encoded_representation(&last)?;
            representations.push(std::mem::replace(&mut last, next));
        }
        representations.push(last);
        Ok(representations)
    }

    /// The bytes representations before each `bytes->bytes` codec and of the
    /// final stored bytes (the last entry).
    fn bytes_representations(
        &self,
        array_representation: &ChunkRepresentation,
    ) -> Result<Vec<BytesRepresentation>, CodecError> {
        let mut representations = Vec::with_capacity(self.bytes_to_bytes.len() + 1);
        let mut last = self.array_to_bytes.compute_encoded_size(array_representation)?;
        for codec in &self.bytes_to_bytes {
            let next = codec.compute_encoded_size(&last);
            representations.push(std::mem::replace(&mut last, next));
        }
        representations.push(last);
        Ok(representations)
    }

    /// The size of the stored chunk bytes given the decoded chunk representation.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a codec rejects the representation.
    pub fn compute_encoded_size(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<BytesRepresentation, CodecError> {
        let array_representations = self.array_representations(decoded_representation)?;
        let serialiser_input = array_representations
            .last()
            .unwrap_or(decoded_representation);
        let bytes_representations = self.bytes_representations(serialiser_input)?;
        Ok(bytes_representations
            .last()
            .copied()
            .unwrap_or(BytesRepresentation::UnboundedSize))
    }

    /// Encode a dense chunk of native-endian bytes into stored chunk bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a codec fails.
    pub fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        if decoded_value.len() as u64 != decoded_representation.size() {
            return Err(CodecError::UnexpectedChunkDecodedSize(
                decoded_value.len(),
                decoded_representation.size(),
            ));
        }

        let array_representations = self.array_representations(decoded_representation)?;
        let serialiser_input = array_representations
            .last()
            .unwrap_or(decoded_representation);

        let mut bytes = decoded_value;
        for (codec, representation) in
            std::iter::zip(&self.array_to_array, &array_representations)
        {
            bytes = codec.encode(bytes, representation)?;
        }
        bytes = self.array_to_bytes.encode(bytes, serialiser_input)?;
        for codec in &self.bytes_to_bytes {
            bytes = codec.encode(bytes)?;
        }
        Ok(bytes)
    }

    /// Decode stored chunk bytes into a dense chunk of native-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a codec fails.
    pub fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let array_representations = self.array_representations(decoded_representation)?;
        let serialiser_input = array_representations
            .last()
            .unwrap_or(decoded_representation);
        let bytes_representations = self.bytes_representations(serialiser_input)?;

        let mut bytes = encoded_value;
        for (codec, representation) in std::iter::zip(
            self.bytes_to_bytes.iter().rev(),
            bytes_representations.iter().rev().skip(1),
        ) {
            bytes = codec.decode(bytes, representation)?;
        }
        bytes = self.array_to_bytes.decode(bytes, serialiser_input)?;
        for (codec, representation) in std::iter::zip(
            self.array_to_array.iter().rev(),
            array_representations.iter().rev().skip(1),
        ) {
            bytes = codec.decode(bytes, representation)?;
        }

        if bytes.len() as u64 != decoded_representation.size() {
            return Err(CodecError::UnexpectedChunkDecodedSize(
                bytes.len(),
                decoded_representation.size(),
            ));
        }
        Ok(bytes)
    }

    /// Create a partial decoder over `input_handle` for a chunk with
    /// `decoded_representation`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if a partial decoder cannot be created.
    pub fn partial_decoder(
        &self,
        mut input_handle: Arc<dyn BytesPartialDecoderTraits>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Arc<dyn ArrayPartialDecoderTraits>, CodecError> {
        let array_representations = self.array_representations(decoded_representation)?;
        let serialiser_input = array_representations
            .last()
            .unwrap_or(decoded_representation);
        let bytes_representations = self.bytes_representations(serialiser_input)?;

        for (codec, representation) in std::iter::zip(
            self.bytes_to_bytes.iter().rev(),
            bytes_representations.iter().rev().skip(1),
        ) {
            input_handle = codec.clone().partial_decoder(input_handle, representation);
        }

        let mut array_handle = self
            .array_to_bytes
            .clone()
            .partial_decoder(input_handle, serialiser_input)?;
        for (codec, representation) in std::iter::zip(
            self.array_to_array.iter().rev(),
            array_representations.iter().rev().skip(1),
        ) {
            array_handle = codec.clone().partial_decoder(array_handle, representation)?;
        }
        Ok(array_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{DataType, FillValue};

    fn chunk_representation() -> ChunkRepresentation {
        ChunkRepresentation::new(
            vec![2, 2].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(0u16),
        )
    }

    #[test]
    fn codec_chain_shape_validation() {
        let bytes = || Codec::ArrayToBytes(Arc::new(BytesCodec::little()));
        assert!(CodecChain::new(vec![bytes()]).is_ok());
        // No array->bytes codec.
        assert!(CodecChain::new(vec![]).is_err());
        // Two array->bytes codecs.
        assert!(CodecChain::new(vec![bytes(), bytes()]).is_err());
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn codec_chain_roundtrip() {
        let chain = CodecChain::from_metadata(&[
            serde_json::from_str(r#"{"name":"bytes","configuration":{"endian":"little"}}"#)
                .unwrap(),
            serde_json::from_str(r#"{"name":"gzip","configuration":{"level":5}}"#).unwrap(),
        ])
        .unwrap();
        let representation = chunk_representation();
        let elements: Vec<u16> = vec![1, 2, 3, 4];
        let bytes: Vec<u8> = elements.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let encoded = chain.encode(bytes.clone(), &representation).unwrap();
        let decoded = chain.decode(encoded, &representation).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn codec_chain_metadata_order() {
        let chain = CodecChain::from_metadata(&[serde_json::from_str(r#""bytes""#).unwrap()])
            .unwrap();
        let metadatas = chain.create_metadatas();
        assert_eq!(metadatas.len(), 1);
        assert_eq!(metadatas[0].name(), "bytes");
        let _ = chain
            .compute_encoded_size(&chunk_representation())
            .unwrap();
    }

    #[test]
    fn codec_unsupported() {
        assert!(matches!(
            Codec::from_metadata(&Metadata::new("unknown-codec")),
            Err(CodecCreateError::Unsupported(_))
        ));
    }
}
