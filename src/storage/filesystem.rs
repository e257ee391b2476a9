//! A filesystem store.
//!
//! Each store key maps to a file under a base directory, with the `/` key
//! separator mapped to the platform path separator.

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use walkdir::WalkDir;

use crate::byte_range::ByteRange;

use super::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeyError, StoreKeys, StoreKeysPrefixes, StorePrefix, StorePrefixes,
    WritableStorageTraits,
};

/// A filesystem store.
///
/// File I/O is synchronous under the hood; the async storage contract is
/// implemented by immediate completion.
#[derive(Debug)]
pub struct FilesystemStore {
    base_path: PathBuf,
    readonly: bool,
    files: Mutex<HashMap<StoreKey, Arc<RwLock<()>>>>,
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The base path is not valid.
    #[error("base path {0} is not valid")]
    InvalidBasePath(PathBuf),
}

impl FilesystemStore {
    /// Create a new filesystem store at a given `base_path`.
    ///
    /// # Errors
    ///
    /// Returns a [`FilesystemStoreCreateError`] if `base_path` is not valid
    /// or points to an existing file rather than a directory.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, FilesystemStoreCreateError> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.to_str().is_none() || base_path.is_file() {
            return Err(FilesystemStoreCreateError::InvalidBasePath(base_path));
        }

        let readonly = if base_path.exists() {
            let md = std::fs::metadata(&base_path)?;
            md.permissions().readonly()
        } else {
            std::fs::create_dir_all(&base_path)?;
            false
        };

        Ok(Self {
            base_path,
            readonly,
            files: Mutex::default(),
        })
    }

    /// Maps a [`StoreKey`] to a filesystem path.
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(key.as_str());
        path
    }

    /// Maps a filesystem path to a [`StoreKey`].
    fn fspath_to_key(&self, path: &Path) -> Result<StoreKey, StoreKeyError> {
        let path = pathdiff::diff_paths(path, &self.base_path)
            .ok_or_else(|| StoreKeyError::from(path.to_string_lossy().to_string()))?;
        let components: Vec<_> = path
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect();
        StoreKey::new(components.join("/"))
    }

    /// Maps a [`StorePrefix`] to a filesystem path.
    #[must_use]
    pub fn prefix_to_fspath(&self, prefix: &StorePrefix) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(prefix.as_str());
        path
    }

    fn file_lock(&self, key: &StoreKey) -> Arc<RwLock<()>> {
        let mut files = self.files.lock();
        files
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::default()))
            .clone()
    }

    fn set_impl(&self, key: &StoreKey, value: &[u8], exclusive: bool) -> Result<bool, StorageError> {
        if self.readonly {
            return Err(StorageError::ReadOnly);
        }
        let lock = self.file_lock(key);
        let _guard = lock.write();

        let key_path = self.key_to_fspath(key);
        if exclusive && key_path.exists() {
            return Ok(false);
        }
        if let Some(parent) = key_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write to a sibling then rename so concurrent readers never observe
        // a truncated value.
        let mut tmp_path = key_path.clone().into_os_string();
        tmp_path.push(".incomplete");
        let tmp_path = PathBuf::from(tmp_path);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(value)?;
        drop(file);
        std::fs::rename(&tmp_path, &key_path)?;
        Ok(true)
    }

    fn get_impl(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, StorageError> {
        let lock = self.file_lock(key);
        let _guard = lock.read();

        let mut file = match File::open(self.key_to_fspath(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let size = file.metadata()?.len();

        let mut out = Vec::with_capacity(byte_ranges.len());
        for byte_range in byte_ranges {
            let start = byte_range.start(size);
            let length = byte_range.length(size);
            if start + length > size {
                return Err(StorageError::from(format!(
                    "byte range {byte_range} is invalid for {key} of size {size}"
                )));
            }
            file.seek(SeekFrom::Start(start))?;
            let mut buffer = vec![0; usize::try_from(length).map_err(|err| err.to_string())?];
            file.read_exact(&mut buffer)?;
            out.push(buffer);
        }
        Ok(Some(out))
    }
}

#[async_trait]
impl ReadableStorageTraits for FilesystemStore {
    async fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self
            .get_impl(key, &[ByteRange::All])?
            .map(|mut values| values.remove(0)))
    }

    async fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Vec<u8>>>, StorageError> {
        self.get_impl(key, byte_ranges)
    }

    async fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let key_path = self.key_to_fspath(key);
        match std::fs::metadata(key_path) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl WritableStorageTraits for FilesystemStore {
    async fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.set_impl(key, value, false)?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &StoreKey, value: &[u8]) -> Result<bool, StorageError> {
        self.set_impl(key, value, true)
    }

    async fn erase(&self, key: &StoreKey) -> Result<bool, StorageError> {
        if self.readonly {
            return Err(StorageError::ReadOnly);
        }
        let lock = self.file_lock(key);
        let _guard = lock.write();
        Ok(std::fs::remove_file(self.key_to_fspath(key)).is_ok())
    }

    async fn erase_prefix(&self, prefix: &StorePrefix) -> Result<bool, StorageError> {
        if self.readonly {
            return Err(StorageError::ReadOnly);
        }
        let _lock = self.files.lock();
        match std::fs::remove_dir_all(self.prefix_to_fspath(prefix)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ListableStorageTraits for FilesystemStore {
    async fn list(&self) -> Result<StoreKeys, StorageError> {
        let mut keys: StoreKeys = WalkDir::new(&self.base_path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| self.fspath_to_key(entry.path()).ok())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let mut keys: StoreKeys = WalkDir::new(self.prefix_to_fspath(prefix))
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| self.fspath_to_key(entry.path()).ok())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys: StoreKeys = vec![];
        let mut prefixes: StorePrefixes = vec![];
        let dir = self.prefix_to_fspath(prefix);
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreKeysPrefixes::new(keys, prefixes))
            }
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() {
                prefixes.push(StorePrefix::new(
                    prefix.as_str().to_string() + &name + "/",
                )?);
            } else if let Ok(key) = StoreKey::new(prefix.as_str().to_string() + &name) {
                keys.push(key);
            }
        }
        keys.sort();
        prefixes.sort();
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filesystem_set_get() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        let key = "a/b".try_into()?;
        store.set(&key, &[0, 1, 2]).await?;
        assert_eq!(store.get(&key).await?.unwrap(), &[0, 1, 2]);
        assert_eq!(store.size_key(&key).await?, Some(3));
        assert_eq!(
            store
                .get_partial_values_key(&key, &[ByteRange::Suffix(2)])
                .await?
                .unwrap(),
            vec![vec![1, 2]]
        );
        assert!(!store.set_if_absent(&key, &[9]).await?);
        assert!(store.erase(&key).await?);
        assert_eq!(store.get(&key).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn filesystem_list() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        store.set(&"a/b".try_into()?, &[]).await?;
        store.set(&"a/c".try_into()?, &[]).await?;
        store.set(&"a/d/e".try_into()?, &[]).await?;
        assert_eq!(
            store.list().await?,
            &["a/b".try_into()?, "a/c".try_into()?, "a/d/e".try_into()?]
        );
        let list_dir = store.list_dir(&"a/".try_into()?).await?;
        assert_eq!(list_dir.keys(), &["a/b".try_into()?, "a/c".try_into()?]);
        assert_eq!(list_dir.prefixes(), &["a/d/".try_into()?]);
        assert!(store.erase_prefix(&"a/d/".try_into()?).await?);
        assert_eq!(
            store.list().await?,
            &["a/b".try_into()?, "a/c".try_into()?]
        );
        Ok(())
    }
}
