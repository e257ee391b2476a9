//! An in-memory store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::byte_range::{extract_byte_ranges, ByteRange};

use super::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
    StoreKeysPrefixes, StorePrefix, StorePrefixes, WritableStorageTraits,
};

/// An in-memory store.
///
/// Keys are held in a [`BTreeMap`], so listings are inherently sorted.
/// All operations complete immediately; the async contract never suspends.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<StoreKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn list_dir_impl(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys: StoreKeys = vec![];
        let mut prefixes: BTreeSet<StorePrefix> = BTreeSet::new();
        let data_map = self.data_map.read();
        for key in data_map.keys() {
            if key.has_prefix(prefix) {
                let key_strip = key.as_str().strip_prefix(prefix.as_str()).unwrap_or_default();
                match key_strip.split_once('/') {
                    Some((child, _)) => {
                        prefixes.insert(StorePrefix::new(
                            prefix.as_str().to_string() + child + "/",
                        )?);
                    }
                    None => keys.push(key.clone()),
                }
            }
        }
        let prefixes: StorePrefixes = prefixes.into_iter().collect();
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }
}

#[async_trait]
impl ReadableStorageTraits for MemoryStore {
    async fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let data_map = self.data_map.read();
        Ok(data_map.get(key).cloned())
    }

    async fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, StorageError> {
        let data_map = self.data_map.read();
        match data_map.get(key) {
            Some(bytes) => Ok(Some(extract_byte_ranges(bytes, byte_ranges)?)),
            None => Ok(None),
        }
    }

    async fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let data_map = self.data_map.read();
        Ok(data_map.get(key).map(|bytes| bytes.len() as u64))
    }
}

#[async_trait]
impl WritableStorageTraits for MemoryStore {
    async fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        let mut data_map = self.data_map.write();
        data_map.insert(key.clone(), value.to_vec());
        Ok(())
    }

    async fn set_if_absent(&self, key: &StoreKey, value: &[u8]) -> Result<bool, StorageError> {
        let mut data_map = self.data_map.write();
        if data_map.contains_key(key) {
            Ok(false)
        } else {
            data_map.insert(key.clone(), value.to_vec());
            Ok(true)
        }
    }

    async fn erase(&self, key: &StoreKey) -> Result<bool, StorageError> {
        let mut data_map = self.data_map.write();
        Ok(data_map.remove(key).is_some())
    }

    async fn erase_prefix(&self, prefix: &StorePrefix) -> Result<bool, StorageError> {
        let mut data_map = self.data_map.write();
        let keys: Vec<StoreKey> = data_map
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect();
        let any_deletions = !keys.is_empty();
        for key in keys {
            data_map.remove(&key);
        }
        Ok(any_deletions)
    }
}

#[async_trait]
impl ListableStorageTraits for MemoryStore {
    async fn list(&self) -> Result<StoreKeys, StorageError> {
        let data_map = self.data_map.read();
        Ok(data_map.keys().cloned().collect())
    }

    async fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let data_map = self.data_map.read();
        Ok(data_map
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }

    async fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        self.list_dir_impl(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_set_get() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let key = "a/b".try_into()?;
        store.set(&key, &[0, 1, 2]).await?;
        assert_eq!(store.get(&key).await?.unwrap(), &[0, 1, 2]);
        assert_eq!(store.size_key(&key).await?, Some(3));
        assert!(store.contains(&key).await?);
        assert!(!store.set_if_absent(&key, &[9]).await?);
        assert_eq!(store.get(&key).await?.unwrap(), &[0, 1, 2]);
        assert_eq!(
            store
                .get_partial_values_key(&key, &[ByteRange::Interval(1, 2)])
                .await?
                .unwrap(),
            vec![vec![1, 2]]
        );
        assert!(store.erase(&key).await?);
        assert!(!store.erase(&key).await?);
        assert_eq!(store.get(&key).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn memory_list() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&"a/b".try_into()?, &[]).await?;
        store.set(&"a/c".try_into()?, &[]).await?;
        store.set(&"a/d/e".try_into()?, &[]).await?;
        store.set(&"a/f/g".try_into()?, &[]).await?;
        assert_eq!(
            store.list().await?,
            &[
                "a/b".try_into()?,
                "a/c".try_into()?,
                "a/d/e".try_into()?,
                "a/f/g".try_into()?
            ]
        );
        assert_eq!(
            store.list_prefix(&"a/d/".try_into()?).await?,
            &["a/d/e".try_into()?]
        );
        let list_dir = store.list_dir(&"a/".try_into()?).await?;
        assert_eq!(list_dir.keys(), &["a/b".try_into()?, "a/c".try_into()?]);
        assert_eq!(
            list_dir.prefixes(),
            &["a/d/".try_into()?, "a/f/".try_into()?]
        );
        Ok(())
    }

    #[tokio::test]
    async fn memory_erase_prefix() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&"a/b".try_into()?, &[]).await?;
        store.set(&"a/d/e".try_into()?, &[]).await?;
        store.set(&"b/c".try_into()?, &[]).await?;
        assert!(store.erase_prefix(&"a/".try_into()?).await?);
        assert_eq!(store.list().await?, &["b/c".try_into()?]);
        Ok(())
    }
}
