use std::sync::Arc;

use crate::metadata::{ArrayShape, Metadata};

use super::{
    codec::{
        ArrayToArrayCodecTraits, ArrayToBytesCodecTraits, BytesCodec, BytesToBytesCodecTraits,
    },
    Array, ArrayCreateError, ArrayMetadata, ArrayMetadataV3, ChunkKeyEncoding, ChunkShape,
    DataType, FillValue,
};

/// An [`Array`] builder for a new Zarr V3 array.
///
/// The default codec pipeline is a lone little-endian `bytes` codec; the
/// default chunk key encoding is `default` with a `/` separator.
///
/// ## Example
/// ```
/// # use std::sync::Arc;
/// use gridstore::array::{ArrayBuilder, DataType, FillValue};
/// # let store = Arc::new(gridstore::storage::MemoryStore::new());
/// let array = ArrayBuilder::new(
///     vec![8, 8],
///     DataType::Float32,
///     vec![4, 4].try_into().unwrap(),
///     FillValue::from(f32::NAN),
/// )
/// .dimension_names(Some(vec![Some("y".to_string()), Some("x".to_string())]))
/// .build(store, "/group/array")
/// .unwrap();
/// array.store_metadata_blocking().unwrap();
/// ```
#[derive(Debug)]
pub struct ArrayBuilder {
    shape: ArrayShape,
    data_type: DataType,
    chunk_shape: ChunkShape,
    fill_value: FillValue,
    array_to_array_codecs: Vec<Arc<dyn ArrayToArrayCodecTraits>>,
    array_to_bytes_codec: Arc<dyn ArrayToBytesCodecTraits>,
    bytes_to_bytes_codecs: Vec<Arc<dyn BytesToBytesCodecTraits>>,
    chunk_key_encoding: ChunkKeyEncoding,
    attributes: serde_json::Map<String, serde_json::Value>,
    dimension_names: Option<Vec<Option<String>>>,
}

impl ArrayBuilder {
    /// Create a new array builder for an array with `shape`, `data_type`,
    /// `chunk_shape`, and `fill_value`.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        data_type: DataType,
        chunk_shape: ChunkShape,
        fill_value: FillValue,
    ) -> Self {
        Self {
            shape,
            data_type,
            chunk_shape,
            fill_value,
            array_to_array_codecs: Vec::new(),
            array_to_bytes_codec: Arc::new(BytesCodec::little()),
            bytes_to_bytes_codecs: Vec::new(),
            chunk_key_encoding: ChunkKeyEncoding::default(),
            attributes: serde_json::Map::new(),
            dimension_names: None,
        }
    }

    /// Set the `array->array` codecs.
    pub fn array_to_array_codecs(
        &mut self,
        codecs: Vec<Arc<dyn ArrayToArrayCodecTraits>>,
    ) -> &mut Self {
        self.array_to_array_codecs = codecs;
        self
    }

    /// Set the `array->bytes` codec.
    pub fn array_to_bytes_codec(&mut self, codec: Arc<dyn ArrayToBytesCodecTraits>) -> &mut Self {
        self.array_to_bytes_codec = codec;
        self
    }

    /// Set the `bytes->bytes` codecs.
    pub fn bytes_to_bytes_codecs(
        &mut self,
        codecs: Vec<Arc<dyn BytesToBytesCodecTraits>>,
    ) -> &mut Self {
        self.bytes_to_bytes_codecs = codecs;
        self
    }

    /// Set the chunk key encoding.
    pub fn chunk_key_encoding(&mut self, chunk_key_encoding: ChunkKeyEncoding) -> &mut Self {
        self.chunk_key_encoding = chunk_key_encoding;
        self
    }

    /// Set the user attributes.
    pub fn attributes(
        &mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Set the dimension names.
    pub fn dimension_names(&mut self, dimension_names: Option<Vec<Option<String>>>) -> &mut Self {
        self.dimension_names = dimension_names;
        self
    }

    /// Build the array metadata.
    fn metadata(&self) -> Result<ArrayMetadataV3, ArrayCreateError> {
        if self.fill_value.size() != self.data_type.size() {
            return Err(ArrayCreateError::InvalidFillValue(
                self.fill_value.size(),
                self.data_type.clone(),
            ));
        }

        let chunk_grid = Metadata::new_with_serializable_configuration(
            "regular",
            &serde_json::json!({ "chunk_shape": self.chunk_shape }),
        )
        .expect("the chunk grid configuration is serialisable");

        let mut codecs = Vec::with_capacity(
            self.array_to_array_codecs.len() + 1 + self.bytes_to_bytes_codecs.len(),
        );
        for codec in &self.array_to_array_codecs {
            codecs.push(codec.create_metadata());
        }
        codecs.push(self.array_to_bytes_codec.create_metadata());
        for codec in &self.bytes_to_bytes_codecs {
            codecs.push(codec.create_metadata());
        }

        Ok(ArrayMetadataV3::new(
            self.shape.clone(),
            self.data_type.metadata(),
            chunk_grid,
            self.chunk_key_encoding.metadata(),
            self.data_type.metadata_fill_value(&self.fill_value),
            codecs,
        )
        .with_attributes(self.attributes.clone())
        .with_dimension_names(self.dimension_names.clone()))
    }

    /// Build an [`Array`] in `storage` at `path`.
    ///
    /// The metadata is not written to the store; use
    /// [`store_metadata`](Array::store_metadata) afterwards.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayCreateError`] if the array parameters are invalid.
    pub fn build<TStorage: ?Sized>(
        &self,
        storage: Arc<TStorage>,
        path: &str,
    ) -> Result<Array<TStorage>, ArrayCreateError> {
        Array::new_with_metadata(storage, path, ArrayMetadata::V3(self.metadata()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn builder_defaults() {
        let store = Arc::new(MemoryStore::new());
        let array = ArrayBuilder::new(
            vec![10],
            DataType::Int32,
            vec![3].try_into().unwrap(),
            FillValue::from(0i32),
        )
        .build(store, "/array")
        .unwrap();
        assert_eq!(array.shape(), &[10]);
        assert_eq!(array.chunk_grid_shape(), vec![4]);
        assert_eq!(array.codecs().create_metadatas().len(), 1);
    }

    #[test]
    fn builder_fill_value_mismatch() {
        let store = Arc::new(MemoryStore::new());
        let result = ArrayBuilder::new(
            vec![10],
            DataType::Int32,
            vec![3].try_into().unwrap(),
            FillValue::from(0u8),
        )
        .build(store, "/array");
        assert!(matches!(
            result,
            Err(ArrayCreateError::InvalidFillValue(1, DataType::Int32))
        ));
    }
}
