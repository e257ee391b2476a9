//! Arrays.
//!
//! An array is a node in a hierarchy holding chunked, compressed,
//! n-dimensional data and its metadata.
//!
//! An [`Array`] handle holds a shared reference to its store and the decoded
//! form of its metadata: data type, chunk shape, fill value, codec chain, and
//! chunk key encoding.
//! Handles for new arrays are built with an [`ArrayBuilder`]; handles for
//! existing arrays are opened with [`Array::open`], which reads the native V3
//! metadata document and falls back to the legacy V2 document pair.
//!
//! Array data operations are asynchronous and grouped by the storage traits
//! they require:
//!  - [`ReadableStorageTraits`](crate::storage::ReadableStorageTraits):
//!    [`retrieve_chunk`](Array::retrieve_chunk),
//!    [`retrieve_chunk_if_exists`](Array::retrieve_chunk_if_exists),
//!    [`retrieve_selection`](Array::retrieve_selection), and the
//!    [`partial_decoder`](Array::partial_decoder) entry point.
//!  - [`WritableStorageTraits`](crate::storage::WritableStorageTraits):
//!    [`store_metadata`](Array::store_metadata),
//!    [`store_chunk`](Array::store_chunk), [`erase_chunk`](Array::erase_chunk).
//!  - Readable and writable: [`store_selection`](Array::store_selection),
//!    which performs read-modify-write on partially overwritten chunks.
//!
//! Every operation has a `_blocking` variant driving the future on the
//! process-wide [`bridge`](crate::bridge) event loop, and an `_elements`
//! variant for typed access.
//!
//! Operations spanning multiple chunks run concurrently; a chunk is written
//! in full exactly when its projection covers the whole chunk, and missing
//! chunks materialise as fill values without touching the codec pipeline.

mod array_builder;
mod array_read;
mod array_representation;
mod array_write;
mod chunk_shape;
pub mod chunk_key_encoding;
pub mod codec;
pub mod data_type;
mod element;
mod endianness;
mod fill_value;

pub use array_builder::ArrayBuilder;
pub use array_representation::{BytesRepresentation, ChunkRepresentation};
pub use chunk_key_encoding::{ChunkKeyEncoding, ChunkKeySeparator, UnsupportedChunkKeyEncodingError};
pub use chunk_shape::{ChunkShape, NonZeroError};
pub use codec::CodecChain;
pub use data_type::{DataType, IncompatibleFillValueMetadataError, UnsupportedDataTypeError};
pub use element::Element;
pub use endianness::{Endianness, NATIVE_ENDIAN};
pub use fill_value::{FillValue, ZARR_NAN_BF16, ZARR_NAN_F16, ZARR_NAN_F32, ZARR_NAN_F64};

pub use crate::metadata::{ArrayMetadata, ArrayMetadataV2, ArrayMetadataV3};

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::{
    metadata::{
        v2::{array_metadata_v2_to_v3, MetadataV2ConversionError},
        ArrayShape,
    },
    node::{read_array_metadata, NodePath},
    selection::{ArraySelection, IncompatibleDimensionalityError, InvalidSelectionError},
    storage::{
        data_key, meta_key, meta_key_v2_array, meta_key_v2_attributes, ReadableStorageTraits,
        StorageError, StoreKey, WritableStorageTraits,
    },
};

use codec::{CodecCreateError, CodecError};

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// No array metadata exists at the path.
    #[error("array metadata is missing at {0}")]
    MissingMetadata(NodePath),
    /// An unsupported data type.
    #[error(transparent)]
    DataTypeCreateError(#[from] UnsupportedDataTypeError),
    /// An invalid fill value.
    #[error(transparent)]
    InvalidFillValueMetadata(#[from] IncompatibleFillValueMetadataError),
    /// The fill value does not match the data type.
    #[error("fill value size {0} does not match the size of data type {1}")]
    InvalidFillValue(usize, DataType),
    /// An invalid codec pipeline.
    #[error(transparent)]
    CodecsCreateError(#[from] CodecCreateError),
    /// An invalid chunk key encoding.
    #[error(transparent)]
    ChunkKeyEncodingCreateError(#[from] UnsupportedChunkKeyEncodingError),
    /// An invalid chunk grid.
    #[error("invalid chunk grid: {0}")]
    InvalidChunkGrid(String),
    /// The chunk grid dimensionality does not match the array shape.
    #[error("chunk grid dimensionality {0} does not match array dimensionality {1}")]
    InvalidChunkGridDimensionality(usize, usize),
    /// An array must have at least one dimension.
    #[error("an array must have at least one dimension")]
    ZeroDimensionality,
    /// The dimension names do not match the array shape.
    #[error("{0} dimension names do not match array dimensionality {1}")]
    InvalidDimensionNames(usize, usize),
    /// The V2 metadata is not expressible in the V3 model.
    #[error(transparent)]
    UnsupportedZarrV2(#[from] MetadataV2ConversionError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
}

/// An array data operation error.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// An invalid selection.
    #[error(transparent)]
    InvalidSelection(#[from] InvalidSelectionError),
    /// The selection does not lie within the array.
    #[error("selection {0} is out of bounds of array shape {1:?}")]
    InvalidArraySelection(ArraySelection, ArrayShape),
    /// The chunk grid indices do not identify a chunk of the array.
    #[error("invalid chunk grid indices {0:?}")]
    InvalidChunkGridIndices(Vec<u64>),
    /// The input buffer size does not match the expected size.
    #[error("invalid input buffer of size {0}, expected {1}")]
    InvalidBytesInputSize(usize, u64),
    /// An incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// The element type does not match the array data type.
    #[error("incompatible element type for data type {0}")]
    IncompatibleElementType(DataType),
}

#[derive(Deserialize)]
struct RegularChunkGridConfiguration {
    chunk_shape: Vec<u64>,
}

/// An array.
#[derive(Debug)]
pub struct Array<TStorage: ?Sized> {
    /// The storage, shared with any other handles into the same hierarchy.
    storage: Arc<TStorage>,
    /// The path of the array in the store.
    path: NodePath,
    /// The data type of the array.
    data_type: DataType,
    /// The shape of every chunk of the regular chunk grid.
    chunk_shape: ChunkShape,
    /// The mapping from chunk grid coordinates to store keys.
    chunk_key_encoding: ChunkKeyEncoding,
    /// The element value of uninitialised portions of the array.
    fill_value: FillValue,
    /// The codecs used to encode and decode chunks.
    codecs: CodecChain,
    /// An optional list of dimension names.
    dimension_names: Option<Vec<Option<String>>>,
    /// The metadata used to create the array.
    metadata: ArrayMetadata,
    /// Whether mutation through this handle is rejected.
    read_only: bool,
}

impl<TStorage: ?Sized> Array<TStorage> {
    /// Create an array handle in `storage` at `path` with `metadata`.
    ///
    /// This does **not** write to the store; use
    /// [`store_metadata`](Array::store_metadata) to persist `metadata`.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayCreateError`] if the metadata is invalid.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        path: &str,
        metadata: ArrayMetadata,
    ) -> Result<Self, ArrayCreateError> {
        let path = NodePath::new(path);

        let metadata_v3 = match &metadata {
            ArrayMetadata::V3(v3) => v3.clone(),
            ArrayMetadata::V2(v2) => array_metadata_v2_to_v3(v2)?,
        };

        if metadata_v3.shape.is_empty() {
            return Err(ArrayCreateError::ZeroDimensionality);
        }

        let data_type = DataType::from_metadata(&metadata_v3.data_type)?;

        if metadata_v3.chunk_grid.name() != "regular" {
            return Err(ArrayCreateError::InvalidChunkGrid(
                metadata_v3.chunk_grid.name().to_string(),
            ));
        }
        let chunk_grid: RegularChunkGridConfiguration = metadata_v3
            .chunk_grid
            .to_configuration()
            .map_err(|err| ArrayCreateError::InvalidChunkGrid(err.to_string()))?;
        let chunk_shape: ChunkShape = chunk_grid
            .chunk_shape
            .try_into()
            .map_err(|err: NonZeroError| ArrayCreateError::InvalidChunkGrid(err.to_string()))?;
        if chunk_shape.dimensionality() != metadata_v3.shape.len() {
            return Err(ArrayCreateError::InvalidChunkGridDimensionality(
                chunk_shape.dimensionality(),
                metadata_v3.shape.len(),
            ));
        }

        let chunk_key_encoding = ChunkKeyEncoding::from_metadata(&metadata_v3.chunk_key_encoding)?;
        let fill_value = data_type.fill_value_from_metadata(&metadata_v3.fill_value)?;
        let codecs = CodecChain::from_metadata(&metadata_v3.codecs)?;

        if let Some(dimension_names) = &metadata_v3.dimension_names {
            if dimension_names.len() != metadata_v3.shape.len() {
                return Err(ArrayCreateError::InvalidDimensionNames(
                    dimension_names.len(),
                    metadata_v3.shape.len(),
                ));
            }
        }

        Ok(Self {
            storage,
            path,
            data_type,
            chunk_shape,
            chunk_key_encoding,
            fill_value,
            codecs,
            dimension_names: metadata_v3.dimension_names,
            metadata,
            read_only: false,
        })
    }

    /// Get the node path.
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Get the fill value.
    #[must_use]
    pub const fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// Get the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        match &self.metadata {
            ArrayMetadata::V3(metadata) => &metadata.shape,
            ArrayMetadata::V2(metadata) => &metadata.shape,
        }
    }

    /// Set the array shape.
    ///
    /// The chunk grid is unchanged; do not forget to store the metadata.
    pub fn set_shape(&mut self, shape: ArrayShape) {
        match &mut self.metadata {
            ArrayMetadata::V3(metadata) => metadata.shape = shape,
            ArrayMetadata::V2(metadata) => metadata.shape = shape,
        }
    }

    /// Get the array dimensionality.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape().len()
    }

    /// Get the chunk shape.
    #[must_use]
    pub const fn chunk_shape(&self) -> &ChunkShape {
        &self.chunk_shape
    }

    /// Get the chunk key encoding.
    #[must_use]
    pub const fn chunk_key_encoding(&self) -> &ChunkKeyEncoding {
        &self.chunk_key_encoding
    }

    /// Get the codec chain.
    #[must_use]
    pub const fn codecs(&self) -> &CodecChain {
        &self.codecs
    }

    /// Get the dimension names.
    #[must_use]
    pub const fn dimension_names(&self) -> &Option<Vec<Option<String>>> {
        &self.dimension_names
    }

    /// Get the user attributes.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        match &self.metadata {
            ArrayMetadata::V3(metadata) => &metadata.attributes,
            ArrayMetadata::V2(metadata) => &metadata.attributes,
        }
    }

    /// Mutably borrow the user attributes.
    ///
    /// Do not forget to store the metadata after mutation.
    pub fn attributes_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        match &mut self.metadata {
            ArrayMetadata::V3(metadata) => &mut metadata.attributes,
            ArrayMetadata::V2(metadata) => &mut metadata.attributes,
        }
    }

    /// Get the underlying array metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    /// Indicates if mutation through this handle is rejected.
    #[must_use]
    pub const fn read_only(&self) -> bool {
        self.read_only
    }

    /// Set whether mutation through this handle is rejected.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// The shape of the chunk grid: the per-axis chunk count.
    #[must_use]
    pub fn chunk_grid_shape(&self) -> ArrayShape {
        std::iter::zip(self.shape(), self.chunk_shape.iter())
            .map(|(&size, &chunk)| size.div_ceil(chunk.get()))
            .collect()
    }

    /// The store key of the chunk at `chunk_indices`.
    #[must_use]
    pub fn chunk_key(&self, chunk_indices: &[u64]) -> StoreKey {
        data_key(&self.path, &self.chunk_key_encoding.encode(chunk_indices))
    }

    /// The representation of every chunk of the array.
    #[must_use]
    pub fn chunk_representation(&self) -> ChunkRepresentation {
        ChunkRepresentation::new(
            self.chunk_shape.clone(),
            self.data_type.clone(),
            self.fill_value.clone(),
        )
    }

    pub(crate) fn validate_chunk_indices(&self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        let chunk_grid_shape = self.chunk_grid_shape();
        let valid = chunk_indices.len() == chunk_grid_shape.len()
            && std::iter::zip(chunk_indices, &chunk_grid_shape).all(|(index, count)| index < count);
        if valid {
            Ok(())
        } else {
            Err(ArrayError::InvalidChunkGridIndices(chunk_indices.to_vec()))
        }
    }

    pub(crate) fn check_writable(&self) -> Result<(), StorageError> {
        if self.read_only {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Array<TStorage> {
    /// Open an existing array in `storage` at `path`, reading its metadata.
    ///
    /// The native V3 metadata document is probed first, then the legacy V2
    /// document pair.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayCreateError::MissingMetadata`] if no array exists at
    /// `path`, or an [`ArrayCreateError`] if the metadata is invalid.
    pub async fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        let node_path = NodePath::new(path);
        let metadata = read_array_metadata(&*storage, &node_path)
            .await?
            .ok_or(ArrayCreateError::MissingMetadata(node_path))?;
        Self::new_with_metadata(storage, path, metadata)
    }

    /// Open an existing array in `storage` at `path` as read-only.
    ///
    /// # Errors
    ///
    /// See [`Array::open`].
    pub async fn open_readonly(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        let mut array = Self::open(storage, path).await?;
        array.read_only = true;
        Ok(array)
    }

    /// Blocking variant of [`Array::open`].
    ///
    /// # Errors
    ///
    /// See [`Array::open`].
    pub fn open_blocking(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        crate::bridge::block_on(Self::open(storage, path))
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Array<TStorage> {
    /// Store the array metadata.
    ///
    /// The metadata is written in the flavour the handle carries: a V3
    /// `zarr.json` document, or a V2 `.zarray` document with attributes in
    /// `.zattrs`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the handle is read-only or the write fails.
    pub async fn store_metadata(&self) -> Result<(), StorageError> {
        self.check_writable()?;
        tracing::debug!(path = %self.path, "store array metadata");
        match &self.metadata {
            ArrayMetadata::V3(metadata) => {
                let key = meta_key(&self.path);
                let json = serde_json::to_vec_pretty(metadata)
                    .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
                self.storage.set(&key, &json).await
            }
            ArrayMetadata::V2(metadata) => {
                let key = meta_key_v2_array(&self.path);
                let json = serde_json::to_vec_pretty(metadata)
                    .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
                self.storage.set(&key, &json).await?;
                if !metadata.attributes.is_empty() {
                    let attributes_key = meta_key_v2_attributes(&self.path);
                    let json = serde_json::to_vec_pretty(&metadata.attributes).map_err(|err| {
                        StorageError::InvalidMetadata(attributes_key.clone(), err.to_string())
                    })?;
                    self.storage.set(&attributes_key, &json).await?;
                }
                Ok(())
            }
        }
    }

    /// Blocking variant of [`Array::store_metadata`].
    ///
    /// # Errors
    ///
    /// See [`Array::store_metadata`].
    pub fn store_metadata_blocking(&self) -> Result<(), StorageError> {
        crate::bridge::block_on(self.store_metadata())
    }

    /// Erase the array: its metadata and all of its chunks.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the handle is read-only or the erase fails.
    pub async fn erase(&self) -> Result<bool, StorageError> {
        self.check_writable()?;
        self.storage
            .erase_prefix(&crate::storage::StorePrefix::from(&self.path))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn array_metadata() -> ArrayMetadata {
        serde_json::from_str(
            r#"{
                "zarr_format": 3,
                "node_type": "array",
                "shape": [8, 8],
                "data_type": "uint16",
                "chunk_grid": { "name": "regular", "configuration": { "chunk_shape": [4, 2] } },
                "chunk_key_encoding": { "name": "default", "configuration": { "separator": "/" } },
                "fill_value": 0,
                "codecs": [{ "name": "bytes", "configuration": { "endian": "little" } }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn array_handle_model() {
        let store = Arc::new(MemoryStore::new());
        let array = Array::new_with_metadata(store, "/array", array_metadata()).unwrap();
        assert_eq!(array.shape(), &[8, 8]);
        assert_eq!(array.data_type(), &DataType::UInt16);
        assert_eq!(array.chunk_shape().to_array_shape(), vec![4, 2]);
        assert_eq!(array.chunk_grid_shape(), vec![2, 4]);
        assert_eq!(array.chunk_key(&[1, 2]).as_str(), "array/c/1/2");
        assert!(!array.read_only());
    }

    #[test]
    fn array_invalid_metadata() {
        let store = Arc::new(MemoryStore::new());
        // Chunk grid dimensionality mismatch.
        let metadata: ArrayMetadata = serde_json::from_str(
            r#"{
                "zarr_format": 3,
                "node_type": "array",
                "shape": [8, 8],
                "data_type": "uint16",
                "chunk_grid": { "name": "regular", "configuration": { "chunk_shape": [4] } },
                "chunk_key_encoding": { "name": "default" },
                "fill_value": 0,
                "codecs": ["bytes"]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            Array::new_with_metadata(store, "/array", metadata),
            Err(ArrayCreateError::InvalidChunkGridDimensionality(1, 2))
        ));
    }

    #[tokio::test]
    async fn array_metadata_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let array = Array::new_with_metadata(store.clone(), "/array", array_metadata())?;
        array.store_metadata().await?;
        let array2 = Array::open(store, "/array").await?;
        assert_eq!(array.metadata(), array2.metadata());
        Ok(())
    }

    #[tokio::test]
    async fn array_read_only_rejects_writes() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let array = Array::new_with_metadata(store.clone(), "/array", array_metadata())?;
        array.store_metadata().await?;
        let array = Array::open_readonly(store, "/array").await?;
        assert!(matches!(
            array.store_metadata().await,
            Err(StorageError::ReadOnly)
        ));
        Ok(())
    }
}
