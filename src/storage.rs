//! Abstract key-value storage.
//!
//! A store is a mapping from [keys](StoreKey) to byte sequences and is the
//! sole persistence surface of a hierarchy: all state is the union of the
//! metadata and chunk keys it holds.
//! Stores implement some combination of the [`ReadableStorageTraits`],
//! [`WritableStorageTraits`], and [`ListableStorageTraits`] traits.
//!
//! Every store operation is asynchronous in contract; purely synchronous
//! stores (e.g. [`MemoryStore`]) implement the contract by immediate
//! completion.
//! A missing key is reported as [`None`], never as an error; transport and
//! I/O failures surface as [`StorageError`].

mod filesystem;
mod memory;
mod store_key;
mod store_prefix;

pub use filesystem::{FilesystemStore, FilesystemStoreCreateError};
pub use memory::MemoryStore;
pub use store_key::{StoreKey, StoreKeyError, StoreKeys};
pub use store_prefix::{StorePrefix, StorePrefixError, StorePrefixes};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    byte_range::{extract_byte_ranges, ByteRange, InvalidByteRangeError},
    node::{NodeNameError, NodePath},
};

/// The value of a store key, or [`None`] if the key is missing.
pub type MaybeBytes = Option<Vec<u8>>;

/// [`Arc`] wrapped readable storage.
pub type ReadableStorage = Arc<dyn ReadableStorageTraits>;

/// [`Arc`] wrapped writable storage.
pub type WritableStorage = Arc<dyn WritableStorageTraits>;

/// [`Arc`] wrapped listable storage.
pub type ListableStorage = Arc<dyn ListableStorageTraits>;

/// Async readable storage traits.
#[async_trait]
pub trait ReadableStorageTraits: Send + Sync {
    /// Retrieve the value (bytes) associated with a given [`StoreKey`].
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an error with the underlying store.
    async fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError>;

    /// Retrieve partial bytes from a list of byte ranges for a store key.
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// The default implementation retrieves the whole value and slices it in
    /// memory; stores supporting ranged reads should override it.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if a byte range is invalid or there is an
    /// error with the underlying store.
    async fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, StorageError> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(extract_byte_ranges(&bytes, byte_ranges)?)),
            None => Ok(None),
        }
    }

    /// Return the size in bytes of the value at `key`.
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an error with the underlying store.
    async fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError>;

    /// Returns true if the store contains `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an error with the underlying store.
    async fn contains(&self, key: &StoreKey) -> Result<bool, StorageError> {
        Ok(self.size_key(key).await?.is_some())
    }
}

/// Async writable storage traits.
#[async_trait]
pub trait WritableStorageTraits: Send + Sync {
    /// Store `value` at `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on failure to store.
    async fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError>;

    /// Store `value` at `key` unless the key already exists.
    ///
    /// Returns true if the value was stored, or false if the key already exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on failure to store.
    async fn set_if_absent(&self, key: &StoreKey, value: &[u8]) -> Result<bool, StorageError>;

    /// Erase a [`StoreKey`].
    ///
    /// Returns true if the key existed and was erased, or false if the key did not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on failure to erase.
    async fn erase(&self, key: &StoreKey) -> Result<bool, StorageError>;

    /// Erase all keys with the given [`StorePrefix`].
    ///
    /// Returns true if any key was erased.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on failure to erase.
    async fn erase_prefix(&self, prefix: &StorePrefix) -> Result<bool, StorageError>;
}

/// Async listable storage traits.
#[async_trait]
pub trait ListableStorageTraits: Send + Sync {
    /// Retrieve all [`StoreKeys`] in the store, lexicographically sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an error with the underlying store.
    async fn list(&self) -> Result<StoreKeys, StorageError>;

    /// Retrieve all [`StoreKeys`] with a given [`StorePrefix`], lexicographically sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an error with the underlying store.
    async fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError>;

    /// Retrieve all keys and prefixes which are direct children of `prefix`,
    /// each lexicographically sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an error with the underlying store.
    async fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError>;
}

/// Readable and writable storage traits.
pub trait ReadableWritableStorageTraits: ReadableStorageTraits + WritableStorageTraits {}

impl<T: ?Sized + ReadableStorageTraits + WritableStorageTraits> ReadableWritableStorageTraits
    for T
{
}

/// Readable and listable storage traits.
pub trait ReadableListableStorageTraits: ReadableStorageTraits + ListableStorageTraits {}

impl<T: ?Sized + ReadableStorageTraits + ListableStorageTraits> ReadableListableStorageTraits
    for T
{
}

/// Readable, writable, and listable storage traits.
pub trait ReadableWritableListableStorageTraits:
    ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

impl<T: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits>
    ReadableWritableListableStorageTraits for T
{
}

/// [`StoreKeys`] and [`StorePrefixes`] that are the direct children of a prefix.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StoreKeysPrefixes {
    keys: StoreKeys,
    prefixes: StorePrefixes,
}

impl StoreKeysPrefixes {
    /// Create a new [`StoreKeysPrefixes`].
    #[must_use]
    pub const fn new(keys: StoreKeys, prefixes: StorePrefixes) -> Self {
        Self { keys, prefixes }
    }

    /// Returns the keys.
    #[must_use]
    pub const fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// Returns the prefixes.
    #[must_use]
    pub const fn prefixes(&self) -> &StorePrefixes {
        &self.prefixes
    }
}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only handle or store.
    #[error("a write operation was attempted on a read only handle or store")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An error parsing the metadata for a key.
    #[error("error parsing metadata for {0}: {1}")]
    InvalidMetadata(StoreKey, String),
    /// An invalid store prefix.
    #[error("invalid store prefix {0}")]
    StorePrefixError(#[from] StorePrefixError),
    /// An invalid store key.
    #[error("invalid store key {0}")]
    InvalidStoreKey(#[from] StoreKeyError),
    /// An invalid node name.
    #[error("invalid node name {0}")]
    NodeNameError(#[from] NodeNameError),
    /// An invalid byte range.
    #[error("invalid byte range {0}")]
    InvalidByteRangeError(#[from] InvalidByteRangeError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// Return the metadata key given a node path for a specified metadata file name.
#[must_use]
fn meta_key_any(path: &NodePath, metadata_file_name: &str) -> StoreKey {
    let path = path.as_str();
    if path.eq("/") {
        unsafe { StoreKey::new_unchecked(metadata_file_name.to_string()) }
    } else {
        let path = path.strip_prefix('/').unwrap_or(path);
        unsafe { StoreKey::new_unchecked(format!("{path}/{metadata_file_name}")) }
    }
}

/// Return the Zarr V3 metadata key (`zarr.json`) given a node path.
#[must_use]
pub fn meta_key(path: &NodePath) -> StoreKey {
    meta_key_any(path, "zarr.json")
}

/// Return the Zarr V2 array metadata key (`.zarray`) given a node path.
#[must_use]
pub fn meta_key_v2_array(path: &NodePath) -> StoreKey {
    meta_key_any(path, ".zarray")
}

/// Return the Zarr V2 group metadata key (`.zgroup`) given a node path.
#[must_use]
pub fn meta_key_v2_group(path: &NodePath) -> StoreKey {
    meta_key_any(path, ".zgroup")
}

/// Return the Zarr V2 user attributes key (`.zattrs`) given a node path.
#[must_use]
pub fn meta_key_v2_attributes(path: &NodePath) -> StoreKey {
    meta_key_any(path, ".zattrs")
}

/// Return the chunk key given a node path and an encoded chunk key suffix.
#[must_use]
pub fn data_key(path: &NodePath, chunk_key: &StoreKey) -> StoreKey {
    let path = path.as_str();
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        chunk_key.clone()
    } else {
        unsafe { StoreKey::new_unchecked(format!("{path}/{}", chunk_key.as_str())) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_keys() {
        let root = NodePath::root();
        assert_eq!(meta_key(&root).as_str(), "zarr.json");
        let path = NodePath::new("/a/b");
        assert_eq!(meta_key(&path).as_str(), "a/b/zarr.json");
        assert_eq!(meta_key_v2_array(&path).as_str(), "a/b/.zarray");
        assert_eq!(meta_key_v2_group(&path).as_str(), "a/b/.zgroup");
        assert_eq!(meta_key_v2_attributes(&path).as_str(), "a/b/.zattrs");
    }

    #[test]
    fn data_keys() {
        let key = data_key(&NodePath::new("/a"), &StoreKey::new("c/0/0").unwrap());
        assert_eq!(key.as_str(), "a/c/0/0");
        let key = data_key(&NodePath::root(), &StoreKey::new("c/1").unwrap());
        assert_eq!(key.as_str(), "c/1");
    }
}
