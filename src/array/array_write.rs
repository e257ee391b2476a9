//! Array store operations.

use futures::StreamExt;

use crate::{
    config::global_config,
    indexer::Indexer,
    selection::ArraySelection,
    storage::{ReadableStorageTraits, WritableStorageTraits},
};

use super::{Array, ArrayError, Element};

impl<TStorage: ?Sized + WritableStorageTraits + 'static> Array<TStorage> {
    /// Encode `chunk_bytes` and store the chunk at `chunk_indices`.
    ///
    /// If the [erase empty chunks](crate::config::Config) configuration is
    /// enabled and every element equals the fill value, the chunk key is
    /// erased instead.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the handle is read-only, `chunk_indices`
    /// are invalid, `chunk_bytes` has the wrong size, encoding fails, or
    /// there is an underlying store error.
    pub async fn store_chunk(
        &self,
        chunk_indices: &[u64],
        chunk_bytes: Vec<u8>,
    ) -> Result<(), ArrayError> {
        self.check_writable()?;
        self.validate_chunk_indices(chunk_indices)?;
        let chunk_representation = self.chunk_representation();
        if chunk_bytes.len() as u64 != chunk_representation.size() {
            return Err(ArrayError::InvalidBytesInputSize(
                chunk_bytes.len(),
                chunk_representation.size(),
            ));
        }

        if global_config().erase_empty_chunks() && self.fill_value().equals_all(&chunk_bytes) {
            self.storage.erase(&self.chunk_key(chunk_indices)).await?;
            return Ok(());
        }

        let encoded = self.codecs().encode(chunk_bytes, &chunk_representation)?;
        self.storage
            .set(&self.chunk_key(chunk_indices), &encoded)
            .await?;
        Ok(())
    }

    /// Store `chunk_elements` as the chunk at `chunk_indices`.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::IncompatibleElementType`] if `T` does not match
    /// the array data type; see [`Array::store_chunk`] otherwise.
    pub async fn store_chunk_elements<T: Element>(
        &self,
        chunk_indices: &[u64],
        chunk_elements: &[T],
    ) -> Result<(), ArrayError> {
        if !T::is_compatible(self.data_type()) {
            return Err(ArrayError::IncompatibleElementType(self.data_type().clone()));
        }
        self.store_chunk(chunk_indices, T::to_bytes(chunk_elements))
            .await
    }

    /// Erase the chunk at `chunk_indices`.
    ///
    /// Returns true if the chunk existed and was erased.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the handle is read-only, `chunk_indices`
    /// are invalid, or there is an underlying store error.
    pub async fn erase_chunk(&self, chunk_indices: &[u64]) -> Result<bool, ArrayError> {
        self.check_writable()?;
        self.validate_chunk_indices(chunk_indices)?;
        Ok(self.storage.erase(&self.chunk_key(chunk_indices)).await?)
    }

    /// Blocking variant of [`Array::store_chunk`].
    ///
    /// # Errors
    ///
    /// See [`Array::store_chunk`].
    pub fn store_chunk_blocking(
        &self,
        chunk_indices: &[u64],
        chunk_bytes: Vec<u8>,
    ) -> Result<(), ArrayError> {
        crate::bridge::block_on(self.store_chunk(chunk_indices, chunk_bytes))
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + 'static> Array<TStorage> {
    /// Store `selection_bytes`, a dense buffer of the selection's shape, into
    /// `selection` of the array.
    ///
    /// Chunk operations run concurrently, bounded by
    /// [`Config::chunk_concurrent_limit`](crate::config::Config).
    /// A chunk that a projection covers in full is encoded and stored
    /// directly; a partially covered chunk is read (or materialised from the
    /// fill value if missing), merged, re-encoded, and stored.
    ///
    /// Writes are atomic per chunk only.
    /// If an error occurs after some chunks have been stored, those chunks
    /// remain stored; the remaining chunk operations are cancelled.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the handle is read-only, the selection
    /// does not lie within the array shape, `selection_bytes` has the wrong
    /// size, a codec fails, or there is an underlying store error.
    pub async fn store_selection(
        &self,
        selection: &ArraySelection,
        selection_bytes: &[u8],
    ) -> Result<(), ArrayError> {
        self.check_writable()?;
        if !selection.is_within(self.shape()) {
            return Err(ArrayError::InvalidArraySelection(
                selection.clone(),
                self.shape().to_vec(),
            ));
        }
        let element_size = self.data_type().size();
        let expected_size = selection.num_elements() * element_size as u64;
        if selection_bytes.len() as u64 != expected_size {
            return Err(ArrayError::InvalidBytesInputSize(
                selection_bytes.len(),
                expected_size,
            ));
        }

        let out_shape = selection.shape();
        let chunk_shape = self.chunk_shape().to_array_shape();
        let indexer = Indexer::new(selection, &chunk_shape)?;
        let num_chunks = indexer.num_chunks();
        if num_chunks == 0 {
            return Ok(());
        }
        tracing::trace!(array = %self.path(), num_chunks, "store selection");

        let concurrent_limit = match global_config().chunk_concurrent_limit() {
            0 => num_chunks,
            limit => limit,
        };
        let chunk_shape = &chunk_shape;
        let out_shape = &out_shape;
        let mut chunks = futures::stream::iter(indexer)
            .map(|projection| async move {
                let block = projection.out_selection.extract_from(
                    selection_bytes,
                    out_shape,
                    element_size,
                )?;
                if projection.chunk_selection.covers_exactly(chunk_shape) {
                    self.store_chunk(&projection.chunk_indices, block).await
                } else {
                    // Read-modify-write of a partially selected chunk.
                    let mut chunk = self.retrieve_chunk(&projection.chunk_indices).await?;
                    projection.chunk_selection.store_into(
                        &block,
                        &mut chunk,
                        chunk_shape,
                        element_size,
                    )?;
                    self.store_chunk(&projection.chunk_indices, chunk).await
                }
            })
            .buffer_unordered(concurrent_limit);
        while let Some(result) = chunks.next().await {
            result?;
        }
        Ok(())
    }

    /// Store `selection_elements` into `selection` of the array.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayError::IncompatibleElementType`] if `T` does not match
    /// the array data type; see [`Array::store_selection`] otherwise.
    pub async fn store_selection_elements<T: Element>(
        &self,
        selection: &ArraySelection,
        selection_elements: &[T],
    ) -> Result<(), ArrayError> {
        if !T::is_compatible(self.data_type()) {
            return Err(ArrayError::IncompatibleElementType(self.data_type().clone()));
        }
        self.store_selection(selection, &T::to_bytes(selection_elements))
            .await
    }

    /// Blocking variant of [`Array::store_selection`].
    ///
    /// # Errors
    ///
    /// See [`Array::store_selection`].
    pub fn store_selection_blocking(
        &self,
        selection: &ArraySelection,
        selection_bytes: &[u8],
    ) -> Result<(), ArrayError> {
        crate::bridge::block_on(self.store_selection(selection, selection_bytes))
    }

    /// Blocking variant of [`Array::store_selection_elements`].
    ///
    /// # Errors
    ///
    /// See [`Array::store_selection_elements`].
    pub fn store_selection_elements_blocking<T: Element>(
        &self,
        selection: &ArraySelection,
        selection_elements: &[T],
    ) -> Result<(), ArrayError> {
        crate::bridge::block_on(self.store_selection(selection, &T::to_bytes(selection_elements)))
    }
}
