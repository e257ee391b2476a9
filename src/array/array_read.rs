//! Array retrieval operations.

use std::sync::Arc;

use futures::StreamExt;

use crate::{
    config::global_config,
    indexer::{ChunkProjection, Indexer},
    selection::ArraySelection,
    storage::ReadableStorageTraits,
};

use super::{
    codec::{ArrayPartialDecoderTraits, StoragePartialDecoder},
    Array, ArrayError, Element,
};

impl<TStorage: ?Sized + ReadableStorageTraits + 'static> Array<TStorage> {
    /// Retrieve and decode the chunk at `chunk_indices`, if it exists.
    ///
    /// The returned bytes are a dense native-endian chunk.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if `chunk_indices` are invalid, decoding
    /// fails, or there is an underlying store error.
    pub async fn retrieve_chunk_if_exists(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<Vec<u8>>, ArrayError> {
        self.validate_chunk_indices(chunk_indices)?;
        let key = self.chunk_key(chunk_indices);
        match self.storage.get(&key).await? {
            Some(encoded) => {
                let decoded = self
                    .codecs()
                    .decode(encoded, &self.chunk_representation())?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    /// Retrieve and decode the chunk at `chunk_indices`.
    ///
    /// A missing chunk materialises as fill values without passing through
    /// the codec pipeline.
    ///
    /// # Errors
    ///
    /// See [`Array::retrieve_chunk_if_exists`].
    pub async fn retrieve_chunk(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, ArrayError> {
        match self.retrieve_chunk_if_exists(chunk_indices).await? {
            Some(chunk) => Ok(chunk),
            None => {
                let num_elements = usize::try_from(self.chunk_representation().num_elements())
                    .map_err(|err| ArrayError::StorageError(err.to_string().into()))?;
                Ok(self.fill_value().all_elements(num_elements))
            }
        }
    }

    /// Create a partial decoder for the chunk at `chunk_indices`.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if `chunk_indices` are invalid or a codec
    /// partial decoder cannot be created.
    pub fn partial_decoder(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Arc<dyn ArrayPartialDecoderTraits>, ArrayError> {
        self.validate_chunk_indices(chunk_indices)?;
        let input_handle = Arc::new(StoragePartialDecoder::new(
            self.storage.clone(),
            self.chunk_key(chunk_indices),
        ));
        Ok(self
            .codecs()
            .partial_decoder(input_handle, &self.chunk_representation())?)
    }

    /// Retrieve `selection` of the array into a dense buffer of native-endian
    /// bytes with the selection's shape.
    ///
    /// Chunk operations run concurrently, bounded by
    /// [`Config::chunk_concurrent_limit`](crate::config::Config).
    /// Chunks that a projection covers in full are retrieved whole; partially
    /// covered chunks go through the codec partial decoders, so for example a
    /// sharded array only reads the inner chunks the selection touches.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the selection does not lie within the
    /// array shape, decoding fails, or there is an underlying store error.
    pub async fn retrieve_selection(
        &self,
        selection: &ArraySelection,
    ) -> Result<Vec<u8>, ArrayError> {
        if !selection.is_within(self.shape()) {
            return Err(ArrayError::InvalidArraySelection(
                selection.clone(),
                self.shape().to_vec(),
            ));
        }

        let element_size = self.data_type().size();
        let out_shape = selection.shape();
        let mut out = self.fill_value().all_elements(selection.num_elements_usize());

        let indexer = Indexer::new(selection, &self.chunk_shape().to_array_shape())?;
        let num_chunks = indexer.num_chunks();
        if num_chunks == 0 {
            return Ok(out);
        }
        tracing::trace!(array = %self.path(), num_chunks, "retrieve selection");

        let concurrent_limit = match global_config().chunk_concurrent_limit() {
            0 => num_chunks,
            limit => limit,
        };
        let mut chunks = futures::stream::iter(indexer)
            .map(|projection| async move {
                let chunk = self.retrieve_chunk_projection(&projection).await?;
                Ok::<_, ArrayError>((projection, chunk))
            })
            .buffer_unordered(concurrent_limit);
        while let Some(result) = chunks.next().await {
            let (projection, chunk) = result?;
            if let Some(chunk) = chunk {
                projection
                    .out_selection
                    .store_into(&chunk, &mut out, &out_shape, element_size)?;
            }
        }
        Ok(out)
    }

    /// Retrieve the projection of a selection onto one chunk.
    ///
    /// Returns [`None`] if the chunk is missing and was covered in full, in
    /// which case the output already holds the fill value.
    async fn retrieve_chunk_projection(
        &self,
        projection: &ChunkProjection,
    ) -> Result<Option<Vec<u8>>, ArrayError> {
        let chunk_shape = self.chunk_shape().to_array_shape();
        if projection.chunk_selection.covers_exactly(&chunk_shape) {
            self.retrieve_chunk_if_exists(&projection.chunk_indices)
                .await
        } else {
            let partial_decoder = self.partial_decoder(&projection.chunk_indices)?;
            Ok(Some(
                partial_decoder
                    .partial_decode(&projection.chunk_selection)
                    .await?,
            ))
        }
    }

    /// Retrieve `selection` of the array as a vector of elements.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::IncompatibleElementType`] if `T` does not match
    /// the array data type; see [`Array::retrieve_selection`] otherwise.
    pub async fn retrieve_selection_elements<T: Element>(
        &self,
        selection: &ArraySelection,
    ) -> Result<Vec<T>, ArrayError> {
        if !T::is_compatible(self.data_type()) {
            return Err(ArrayError::IncompatibleElementType(self.data_type().clone()));
        }
        let bytes = self.retrieve_selection(selection).await?;
        Ok(T::from_bytes(&bytes))
    }

    /// Retrieve the chunk at `chunk_indices` as a vector of elements.
    ///
    /// # Errors
    ///
    /// See [`Array::retrieve_chunk`] and [`Array::retrieve_selection_elements`].
    pub async fn retrieve_chunk_elements<T: Element>(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Vec<T>, ArrayError> {
        if !T::is_compatible(self.data_type()) {
            return Err(ArrayError::IncompatibleElementType(self.data_type().clone()));
        }
        let bytes = self.retrieve_chunk(chunk_indices).await?;
        Ok(T::from_bytes(&bytes))
    }

    /// Blocking variant of [`Array::retrieve_selection`].
    ///
    /// # Errors
    ///
    /// See [`Array::retrieve_selection`].
    pub fn retrieve_selection_blocking(
        &self,
        selection: &ArraySelection,
    ) -> Result<Vec<u8>, ArrayError> {
        crate::bridge::block_on(self.retrieve_selection(selection))
    }

    /// Blocking variant of [`Array::retrieve_selection_elements`].
    ///
    /// # Errors
    ///
    /// See [`Array::retrieve_selection_elements`].
    pub fn retrieve_selection_elements_blocking<T: Element>(
        &self,
        selection: &ArraySelection,
    ) -> Result<Vec<T>, ArrayError> {
        crate::bridge::block_on(self.retrieve_selection_elements(selection))
    }

    /// Blocking variant of [`Array::retrieve_chunk`].
    ///
    /// # Errors
    ///
    /// See [`Array::retrieve_chunk`].
    pub fn retrieve_chunk_blocking(&self, chunk_indices: &[u64]) -> Result<Vec<u8>, ArrayError> {
        crate::bridge::block_on(self.retrieve_chunk(chunk_indices))
    }
}
