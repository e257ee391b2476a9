//! Groups.
//!
//! A group is a node in a hierarchy that can hold child groups and
//! [arrays](crate::array::Array).
//! Groups have no intrinsic children list: membership is discovered by
//! listing the store under the group's prefix and probing each child for a
//! metadata sentinel.
//!
//! Creation walks the parent chain: every ancestor of a new node must be
//! absent (it is then initialised as a group) or already a group; an array
//! anywhere on the chain is a schema conflict.
//! Child enumeration ([`Group::child_names`], [`Group::group_keys`],
//! [`Group::array_keys`]) is lexicographic by child name, a stable contract.
//!
//! Every mutating operation checks the per-handle read-only flag before
//! touching the store.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    array::{Array, ArrayCreateError, ArrayMetadata},
    metadata::{GroupMetadata, GroupMetadataV3},
    node::{
        contains_array, node_kind, read_group_metadata, NodeError, NodeKind, NodeName, NodePath,
    },
    storage::{
        meta_key, meta_key_v2_attributes, meta_key_v2_group, ListableStorageTraits,
        ReadableStorageTraits, StorageError, StorePrefix, WritableStorageTraits,
    },
};

/// Validate every name component of a node path.
fn validate_node_names(path: &NodePath) -> Result<(), StorageError> {
    for name in path.names() {
        NodeName::new(name)?;
    }
    Ok(())
}

/// A group error.
#[derive(Debug, Error)]
pub enum GroupError {
    /// No group metadata exists at the path.
    #[error("group metadata is missing at {0}")]
    MissingMetadata(NodePath),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A node error.
    #[error(transparent)]
    NodeError(#[from] NodeError),
    /// A node already exists at the path.
    #[error("a node already exists at {0}")]
    AlreadyExists(NodePath),
    /// An array node occupies the path.
    #[error("an array exists at {0}")]
    ContainsArray(NodePath),
    /// A group node occupies the path.
    #[error("a group exists at {0}")]
    ContainsGroup(NodePath),
    /// No node exists at the path.
    #[error("no node exists at {0}")]
    NotFound(NodePath),
    /// An array creation error.
    #[error(transparent)]
    ArrayCreateError(#[from] ArrayCreateError),
}

/// A group.
#[derive(Debug)]
pub struct Group<TStorage: ?Sized> {
    /// The storage, shared with any other handles into the same hierarchy.
    storage: Arc<TStorage>,
    /// The path of the group in the store.
    path: NodePath,
    /// The metadata.
    metadata: GroupMetadata,
    /// Whether mutation through this handle is rejected.
    read_only: bool,
}

/// A child of a group: an array or a group.
#[derive(Debug)]
pub enum Child<TStorage: ?Sized> {
    /// An array child.
    Array(Array<TStorage>),
    /// A group child.
    Group(Group<TStorage>),
}

impl<TStorage: ?Sized> Group<TStorage> {
    /// Create a group handle in `storage` at `path` with `metadata`.
    ///
    /// This does **not** write to the store; use
    /// [`store_metadata`](Group::store_metadata) to persist `metadata`.
    #[must_use]
    pub fn new_with_metadata(storage: Arc<TStorage>, path: &str, metadata: GroupMetadata) -> Self {
        Self {
            storage,
            path: NodePath::new(path),
            metadata,
            read_only: false,
        }
    }

    /// Get the node path.
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the user attributes.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        match &self.metadata {
            GroupMetadata::V3(metadata) => &metadata.attributes,
            GroupMetadata::V2(metadata) => &metadata.attributes,
        }
    }

    /// Mutably borrow the user attributes.
    ///
    /// Do not forget to store the metadata after mutation.
    pub fn attributes_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        match &mut self.metadata {
            GroupMetadata::V3(metadata) => &mut metadata.attributes,
            GroupMetadata::V2(metadata) => &mut metadata.attributes,
        }
    }

    /// Get the underlying group metadata.
    #[must_use]
    pub const fn metadata(&self) -> &GroupMetadata {
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

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.read_only {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> Group<TStorage> {
    /// Open an existing group in `storage` at `path`, reading its metadata.
    ///
    /// The native V3 metadata document is probed first, then the legacy V2
    /// document pair.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::ContainsArray`] if the path holds an array,
    /// [`GroupError::MissingMetadata`] if it holds nothing, or a storage
    /// error otherwise.
    pub async fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupError> {
        let node_path = NodePath::new(path);
        match read_group_metadata(&*storage, &node_path).await? {
            Some(metadata) => Ok(Self::new_with_metadata(storage, path, metadata)),
            None => {
                if contains_array(&*storage, &node_path).await? {
                    Err(GroupError::ContainsArray(node_path))
                } else {
                    Err(GroupError::MissingMetadata(node_path))
                }
            }
        }
    }

    /// Open an existing group in `storage` at `path` as read-only.
    ///
    /// # Errors
    ///
    /// See [`Group::open`].
    pub async fn open_readonly(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupError> {
        let mut group = Self::open(storage, path).await?;
        group.read_only = true;
        Ok(group)
    }

    /// Blocking variant of [`Group::open`].
    ///
    /// # Errors
    ///
    /// See [`Group::open`].
    pub fn open_blocking(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupError> {
        crate::bridge::block_on(Self::open(storage, path))
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Group<TStorage> {
    /// Store the group metadata.
    ///
    /// The metadata is written in the flavour the handle carries: a V3
    /// `zarr.json` document, or a V2 `.zgroup` document with attributes in
    /// `.zattrs`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the handle is read-only or the write fails.
    pub async fn store_metadata(&self) -> Result<(), StorageError> {
        self.check_writable()?;
        tracing::debug!(path = %self.path, "store group metadata");
        match &self.metadata {
            GroupMetadata::V3(metadata) => {
                let key = meta_key(&self.path);
                let json = serde_json::to_vec_pretty(metadata)
                    .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
                self.storage.set(&key, &json).await
            }
            GroupMetadata::V2(metadata) => {
                let key = meta_key_v2_group(&self.path);
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

    /// Blocking variant of [`Group::store_metadata`].
    ///
    /// # Errors
    ///
    /// See [`Group::store_metadata`].
    pub fn store_metadata_blocking(&self) -> Result<(), StorageError> {
        crate::bridge::block_on(self.store_metadata())
    }

    /// Erase the group: its metadata and, transitively, all of its children.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the handle is read-only or the erase fails.
    pub async fn erase(&self) -> Result<bool, StorageError> {
        self.check_writable()?;
        self.storage
            .erase_prefix(&StorePrefix::from(&self.path))
            .await
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits> Group<TStorage> {
    /// Walk the ancestors of `path` from the root down, initialising any
    /// absent intermediate as a group and rejecting arrays on the chain.
    async fn ensure_parents_are_groups(
        storage: &Arc<TStorage>,
        path: &NodePath,
    ) -> Result<(), GroupError> {
        let mut chain = path.ancestors();
        if !path.is_root() {
            chain.insert(0, NodePath::root());
        }
        for ancestor in chain {
            match node_kind(&**storage, &ancestor).await? {
                NodeKind::Group => {}
                NodeKind::Array => return Err(GroupError::ContainsArray(ancestor)),
                NodeKind::Absent => {
                    let group = Self::new_with_metadata(
                        storage.clone(),
                        ancestor.as_str(),
                        GroupMetadata::V3(GroupMetadataV3::default()),
                    );
                    group.init_metadata().await?;
                }
            }
        }
        Ok(())
    }

    /// Write the group metadata only if no node occupies the key.
    async fn init_metadata(&self) -> Result<bool, GroupError> {
        let key = meta_key(&self.path);
        let GroupMetadata::V3(metadata) = &self.metadata else {
            // New groups are always created with V3 metadata.
            return Err(GroupError::StorageError(StorageError::Other(
                "only V3 groups can be initialised".to_string(),
            )));
        };
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        Ok(self.storage.set_if_absent(&key, &json).await?)
    }

    /// Create a new group in `storage` at `path`.
    ///
    /// Absent intermediate nodes are initialised as groups.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::ContainsArray`] if `path` or an ancestor holds
    /// an array, [`GroupError::ContainsGroup`] if `path` already holds a
    /// group, or a storage error otherwise.
    pub async fn create(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupError> {
        let node_path = NodePath::new(path);
        validate_node_names(&node_path)?;
        Self::ensure_parents_are_groups(&storage, &node_path).await?;
        match node_kind(&*storage, &node_path).await? {
            NodeKind::Array => return Err(GroupError::ContainsArray(node_path)),
            NodeKind::Group => return Err(GroupError::ContainsGroup(node_path)),
            NodeKind::Absent => {}
        }
        let group = Self::new_with_metadata(
            storage,
            node_path.as_str(),
            GroupMetadata::V3(GroupMetadataV3::default()),
        );
        if group.init_metadata().await? {
            Ok(group)
        } else {
            Err(GroupError::AlreadyExists(node_path))
        }
    }

    /// Open the group in `storage` at `path`, creating it (and any absent
    /// intermediates) if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::ContainsArray`] if `path` or an ancestor holds
    /// an array, or a storage error otherwise.
    pub async fn require(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupError> {
        let node_path = NodePath::new(path);
        match node_kind(&*storage, &node_path).await? {
            NodeKind::Group => Self::open(storage, path).await,
            NodeKind::Array => Err(GroupError::ContainsArray(node_path)),
            NodeKind::Absent => Self::create(storage, path).await,
        }
    }

    /// Blocking variant of [`Group::create`].
    ///
    /// # Errors
    ///
    /// See [`Group::create`].
    pub fn create_blocking(storage: Arc<TStorage>, path: &str) -> Result<Self, GroupError> {
        crate::bridge::block_on(Self::create(storage, path))
    }

    /// Create a child group named `name`.
    ///
    /// # Errors
    ///
    /// Returns a [`GroupError`] if the handle is read-only or creation fails;
    /// see [`Group::create`].
    pub async fn create_group(&self, name: &str) -> Result<Self, GroupError> {
        self.check_writable()?;
        Self::create(self.storage.clone(), self.path.child(name).as_str()).await
    }

    /// Open the child group named `name`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`GroupError`] if the handle is read-only or creation fails;
    /// see [`Group::require`].
    pub async fn require_group(&self, name: &str) -> Result<Self, GroupError> {
        self.check_writable()?;
        Self::require(self.storage.clone(), self.path.child(name).as_str()).await
    }

    /// Create a child array named `name` with `metadata` and store its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::ContainsArray`] or [`GroupError::ContainsGroup`]
    /// if a node already occupies the path, an
    /// [`ArrayCreateError`](GroupError::ArrayCreateError) if `metadata` is
    /// invalid, or a storage error otherwise.
    pub async fn create_array(
        &self,
        name: &str,
        metadata: ArrayMetadata,
    ) -> Result<Array<TStorage>, GroupError> {
        self.check_writable()?;
        let path = self.path.child(name);
        validate_node_names(&path)?;
        Self::ensure_parents_are_groups(&self.storage, &path).await?;
        match node_kind(&*self.storage, &path).await? {
            NodeKind::Array => return Err(GroupError::ContainsArray(path)),
            NodeKind::Group => return Err(GroupError::ContainsGroup(path)),
            NodeKind::Absent => {}
        }
        let array = Array::new_with_metadata(self.storage.clone(), path.as_str(), metadata)?;
        array.store_metadata().await?;
        Ok(array)
    }

    /// Blocking variant of [`Group::create_group`].
    ///
    /// # Errors
    ///
    /// See [`Group::create_group`].
    pub fn create_group_blocking(&self, name: &str) -> Result<Self, GroupError> {
        crate::bridge::block_on(self.create_group(name))
    }

    /// Blocking variant of [`Group::create_array`].
    ///
    /// # Errors
    ///
    /// See [`Group::create_array`].
    pub fn create_array_blocking(
        &self,
        name: &str,
        metadata: ArrayMetadata,
    ) -> Result<Array<TStorage>, GroupError> {
        crate::bridge::block_on(self.create_array(name, metadata))
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + 'static> Group<TStorage> {
    /// Get the child node named `name`, dispatching on its kind.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::NotFound`] if no node exists at the child path,
    /// or a storage error otherwise.
    pub async fn child(&self, name: &str) -> Result<Child<TStorage>, GroupError> {
        let path = self.path.child(name);
        match node_kind(&*self.storage, &path).await? {
            NodeKind::Array => Ok(Child::Array(
                Array::open(self.storage.clone(), path.as_str()).await?,
            )),
            NodeKind::Group => Ok(Child::Group(
                Self::open(self.storage.clone(), path.as_str()).await?,
            )),
            NodeKind::Absent => Err(GroupError::NotFound(path)),
        }
    }

    /// Blocking variant of [`Group::child`].
    ///
    /// # Errors
    ///
    /// See [`Group::child`].
    pub fn child_blocking(&self, name: &str) -> Result<Child<TStorage>, GroupError> {
        crate::bridge::block_on(self.child(name))
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits> Group<TStorage> {
    async fn child_names_of_kind(&self, kind: Option<NodeKind>) -> Result<Vec<String>, GroupError> {
        let prefix = StorePrefix::from(&self.path);
        let listing = self.storage.list_dir(&prefix).await?;
        let mut names = Vec::new();
        for child_prefix in listing.prefixes() {
            let name = child_prefix.name().to_string();
            let child_kind = node_kind(&*self.storage, &self.path.child(&name)).await?;
            let keep = match kind {
                Some(kind) => child_kind == kind,
                None => child_kind != NodeKind::Absent,
            };
            if keep {
                names.push(name);
            }
        }
        // The store listing is sorted, but the contract is lexicographic
        // regardless of the backend.
        names.sort();
        Ok(names)
    }

    /// The names of all child nodes, lexicographically sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`GroupError`] on an underlying store error or invalid metadata.
    pub async fn child_names(&self) -> Result<Vec<String>, GroupError> {
        self.child_names_of_kind(None).await
    }

    /// The names of the child groups, lexicographically sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`GroupError`] on an underlying store error or invalid metadata.
    pub async fn group_keys(&self) -> Result<Vec<String>, GroupError> {
        self.child_names_of_kind(Some(NodeKind::Group)).await
    }

    /// The names of the child arrays, lexicographically sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`GroupError`] on an underlying store error or invalid metadata.
    pub async fn array_keys(&self) -> Result<Vec<String>, GroupError> {
        self.child_names_of_kind(Some(NodeKind::Array)).await
    }

    /// Blocking variant of [`Group::child_names`].
    ///
    /// # Errors
    ///
    /// See [`Group::child_names`].
    pub fn child_names_blocking(&self) -> Result<Vec<String>, GroupError> {
        crate::bridge::block_on(self.child_names())
    }

    /// Blocking variant of [`Group::group_keys`].
    ///
    /// # Errors
    ///
    /// See [`Group::group_keys`].
    pub fn group_keys_blocking(&self) -> Result<Vec<String>, GroupError> {
        crate::bridge::block_on(self.group_keys())
    }

    /// Blocking variant of [`Group::array_keys`].
    ///
    /// # Errors
    ///
    /// See [`Group::array_keys`].
    pub fn array_keys_blocking(&self) -> Result<Vec<String>, GroupError> {
        crate::bridge::block_on(self.array_keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn group_create_and_open() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let group = Group::create(store.clone(), "/a/b").await?;
        assert_eq!(group.path().as_str(), "/a/b");
        // Intermediates were initialised as groups.
        let a = Group::open(store.clone(), "/a").await?;
        assert_eq!(a.path().as_str(), "/a");
        // Recreating is an error; require is idempotent.
        assert!(matches!(
            Group::create(store.clone(), "/a/b").await,
            Err(GroupError::ContainsGroup(_))
        ));
        let _ = Group::require(store.clone(), "/a/b").await?;
        Ok(())
    }

    #[tokio::test]
    async fn group_metadata_attributes() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let mut group = Group::create(store.clone(), "/group").await?;
        group
            .attributes_mut()
            .insert("spam".to_string(), "ham".into());
        group.store_metadata().await?;
        let group = Group::open(store, "/group").await?;
        assert_eq!(group.attributes()["spam"], "ham");
        Ok(())
    }

    #[tokio::test]
    async fn group_read_only_rejects_writes() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        Group::create(store.clone(), "/group").await?;
        let group = Group::open_readonly(store, "/group").await?;
        assert!(matches!(
            group.create_group("child").await,
            Err(GroupError::StorageError(StorageError::ReadOnly))
        ));
        assert!(matches!(
            group.store_metadata().await,
            Err(StorageError::ReadOnly)
        ));
        Ok(())
    }
}
