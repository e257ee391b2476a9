//! Hierarchy nodes.
//!
//! A node in a hierarchy is either an [`Array`](crate::array::Array) or a
//! [`Group`](crate::group::Group), identified by a [`NodePath`].
//! A store prefix holds an array if an array metadata sentinel key exists
//! under it, and a group if a group metadata sentinel exists; node kinds are
//! discovered by probing those sentinels with [`node_kind`].
//!
//! [`Node`] is a point-in-time snapshot of a node and its children;
//! [`Node::hierarchy_tree`] renders the hierarchy below a node as a string.

mod node_name;
mod node_path;

pub use node_name::{NodeName, NodeNameError};
pub use node_path::NodePath;

use async_recursion::async_recursion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    metadata::{ArrayMetadata, GroupMetadata, GroupMetadataV2},
    storage::{
        meta_key, meta_key_v2_array, meta_key_v2_attributes, meta_key_v2_group,
        ListableStorageTraits, ReadableStorageTraits, StorageError, StoreKey, StorePrefix,
    },
};

/// The kind of the node at a store prefix.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NodeKind {
    /// The node is an array.
    Array,
    /// The node is a group.
    Group,
    /// There is no node at the path.
    Absent,
}

/// The metadata of a node.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum NodeMetadata {
    /// Array metadata.
    Array(ArrayMetadata),
    /// Group metadata.
    Group(GroupMetadata),
}

/// A node error.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The node is simultaneously an array and a group.
    #[error("the node at {0} is both an array and a group")]
    SchemaConflict(NodePath),
    /// There is no node at the path.
    #[error("no node exists at {0}")]
    NotFound(NodePath),
}

fn invalid_metadata(key: &StoreKey, err: &serde_json::Error) -> StorageError {
    StorageError::InvalidMetadata(key.clone(), err.to_string())
}

/// Read the array metadata of the node at `path`, if any.
///
/// Probes the V3 sentinel (`zarr.json` with `"node_type": "array"`) and then
/// the V2 sentinel pair (`.zarray` and `.zattrs`).
///
/// # Errors
///
/// Returns a [`StorageError`] if a sentinel exists but holds invalid
/// metadata, or on an underlying store error.
pub async fn read_array_metadata<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<Option<ArrayMetadata>, StorageError> {
    let key_v3 = meta_key(path);
    if let Some(bytes) = storage.get(&key_v3).await? {
        let metadata: NodeMetadata =
            serde_json::from_slice(&bytes).map_err(|err| invalid_metadata(&key_v3, &err))?;
        if let NodeMetadata::Array(metadata) = metadata {
            return Ok(Some(metadata));
        }
        // A V3 group document does not preclude a stray V2 array sentinel;
        // fall through so schema conflicts are observable.
    }

    let key_v2 = meta_key_v2_array(path);
    if let Some(bytes) = storage.get(&key_v2).await? {
        let mut metadata: crate::metadata::ArrayMetadataV2 =
            serde_json::from_slice(&bytes).map_err(|err| invalid_metadata(&key_v2, &err))?;
        let attributes_key = meta_key_v2_attributes(path);
        if let Some(attributes) = storage.get(&attributes_key).await? {
            metadata.attributes = serde_json::from_slice(&attributes)
                .map_err(|err| invalid_metadata(&attributes_key, &err))?;
        }
        return Ok(Some(ArrayMetadata::V2(metadata)));
    }

    Ok(None)
}

/// Read the group metadata of the node at `path`, if any.
///
/// Probes the V3 sentinel (`zarr.json` with `"node_type": "group"`) and then
/// the V2 sentinel pair (`.zgroup` and `.zattrs`).
///
/// # Errors
///
/// Returns a [`StorageError`] if a sentinel exists but holds invalid
/// metadata, or on an underlying store error.
pub async fn read_group_metadata<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<Option<GroupMetadata>, StorageError> {
    let key_v3 = meta_key(path);
    if let Some(bytes) = storage.get(&key_v3).await? {
        let metadata: NodeMetadata =
            serde_json::from_slice(&bytes).map_err(|err| invalid_metadata(&key_v3, &err))?;
        if let NodeMetadata::Group(metadata) = metadata {
            return Ok(Some(metadata));
        }
    }

    let key_v2 = meta_key_v2_group(path);
    if let Some(bytes) = storage.get(&key_v2).await? {
        let mut metadata: GroupMetadataV2 =
            serde_json::from_slice(&bytes).map_err(|err| invalid_metadata(&key_v2, &err))?;
        let attributes_key = meta_key_v2_attributes(path);
        if let Some(attributes) = storage.get(&attributes_key).await? {
            metadata.attributes = serde_json::from_slice(&attributes)
                .map_err(|err| invalid_metadata(&attributes_key, &err))?;
        }
        return Ok(Some(GroupMetadata::V2(metadata)));
    }

    Ok(None)
}

/// Returns true if an array node exists at `path`.
///
/// # Errors
///
/// Returns a [`StorageError`] on an underlying store error or invalid metadata.
pub async fn contains_array<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<bool, StorageError> {
    Ok(read_array_metadata(storage, path).await?.is_some())
}

/// Returns true if a group node exists at `path`.
///
/// # Errors
///
/// Returns a [`StorageError`] on an underlying store error or invalid metadata.
pub async fn contains_group<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<bool, StorageError> {
    Ok(read_group_metadata(storage, path).await?.is_some())
}

/// Discover the kind of the node at `path`.
///
/// # Errors
///
/// Returns [`NodeError::SchemaConflict`] if the path holds both array and
/// group metadata, or a [`NodeError::StorageError`] on an underlying store
/// error or invalid metadata.
pub async fn node_kind<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<NodeKind, NodeError> {
    let is_array = contains_array(storage, path).await?;
    let is_group = contains_group(storage, path).await?;
    match (is_array, is_group) {
        (true, true) => Err(NodeError::SchemaConflict(path.clone())),
        (true, false) => Ok(NodeKind::Array),
        (false, true) => Ok(NodeKind::Group),
        (false, false) => Ok(NodeKind::Absent),
    }
}

/// Read the metadata of the node at `path`.
///
/// # Errors
///
/// Returns [`NodeError::NotFound`] if no node exists at `path`,
/// [`NodeError::SchemaConflict`] if the path holds both array and group
/// metadata, or a storage error otherwise.
pub async fn read_node_metadata<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<NodeMetadata, NodeError> {
    let array = read_array_metadata(storage, path).await?;
    let group = read_group_metadata(storage, path).await?;
    match (array, group) {
        (Some(_), Some(_)) => Err(NodeError::SchemaConflict(path.clone())),
        (Some(metadata), None) => Ok(NodeMetadata::Array(metadata)),
        (None, Some(metadata)) => Ok(NodeMetadata::Group(metadata)),
        (None, None) => Err(NodeError::NotFound(path.clone())),
    }
}

/// A hierarchy node: its path, metadata, and children.
#[derive(Debug, Clone)]
pub struct Node {
    path: NodePath,
    metadata: NodeMetadata,
    children: Vec<Node>,
}

impl Node {
    /// Create a new node at `path`, reading its metadata and children from `storage`.
    ///
    /// # Errors
    ///
    /// Returns a [`NodeError`] if the node does not exist, its metadata is
    /// invalid, or child enumeration fails.
    pub async fn open<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
        storage: &TStorage,
        path: &str,
    ) -> Result<Self, NodeError> {
        let path = NodePath::new(path);
        let metadata = read_node_metadata(storage, &path).await?;
        let children = match metadata {
            NodeMetadata::Array(_) => Vec::default(),
            NodeMetadata::Group(_) => child_nodes(storage, &path).await?,
        };
        Ok(Self {
            path,
            metadata,
            children,
        })
    }

    /// Create a new node from its constituents.
    #[must_use]
    pub fn new_with_metadata(path: NodePath, metadata: NodeMetadata, children: Vec<Self>) -> Self {
        Self {
            path,
            metadata,
            children,
        }
    }

    /// Indicates if the node is the root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    /// Returns the name of the node.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Returns a reference to the path of the node.
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// Returns a reference to the metadata of the node.
    #[must_use]
    pub const fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    /// Returns a reference to the children of the node.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Return a tree representation of the hierarchy below this node as a string.
    ///
    /// Arrays are annotated with their shape and data type.
    /// For example:
    /// ```text
    /// /
    ///   a
    ///     baz [10000, 1000] float64
    ///     foo [10000, 1000] float64
    ///   b
    /// ```
    #[must_use]
    pub fn hierarchy_tree(&self) -> String {
        fn print_node(name: &str, string: &mut String, metadata: &NodeMetadata) {
            match metadata {
                NodeMetadata::Array(array_metadata) => {
                    let (shape, data_type) = match array_metadata {
                        ArrayMetadata::V3(metadata) => {
                            (&metadata.shape, metadata.data_type.name().to_string())
                        }
                        ArrayMetadata::V2(metadata) => (&metadata.shape, metadata.dtype.clone()),
                    };
                    string.push_str(&format!("{name} {shape:?} {data_type}"));
                }
                NodeMetadata::Group(_) => {
                    string.push_str(name);
                }
            }
            string.push('\n');
        }

        fn update_tree(string: &mut String, children: &[Node], depth: usize) {
            for child in children {
                string.push_str(&" ".repeat(depth * 2));
                print_node(child.name(), string, &child.metadata);
                update_tree(string, &child.children, depth + 1);
            }
        }

        let mut string = String::new();
        print_node("/", &mut string, &self.metadata);
        update_tree(&mut string, &self.children, 1);
        string
    }
}

/// Enumerate the child nodes of the node at `path`, in lexicographic order
/// of child name, recursively opening group children.
///
/// # Errors
///
/// Returns a [`NodeError`] on an underlying store error or invalid metadata.
#[async_recursion]
pub async fn child_nodes<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<Vec<Node>, NodeError> {
    let prefix = StorePrefix::from(path);
    let listing = storage.list_dir(&prefix).await?;
    let mut nodes = Vec::new();
    for child_prefix in listing.prefixes() {
        let child_path = path.child(child_prefix.name());
        let metadata = match read_node_metadata(storage, &child_path).await {
            Ok(metadata) => metadata,
            Err(NodeError::NotFound(_)) => continue,
            Err(err) => return Err(err),
        };
        let children = match metadata {
            NodeMetadata::Array(_) => Vec::default(),
            NodeMetadata::Group(_) => child_nodes(storage, &child_path).await?,
        };
        nodes.push(Node::new_with_metadata(child_path, metadata, children));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, WritableStorageTraits};

    const JSON_ARRAY: &str = r#"{
        "zarr_format": 3,
        "node_type": "array",
        "shape": [100],
        "data_type": "uint8",
        "chunk_grid": { "name": "regular", "configuration": { "chunk_shape": [10] } },
        "chunk_key_encoding": { "name": "default", "configuration": { "separator": "/" } },
        "fill_value": 0,
        "codecs": [{ "name": "bytes", "configuration": { "endian": "little" } }]
    }"#;

    const JSON_GROUP: &str = r#"{
        "zarr_format": 3,
        "node_type": "group"
    }"#;

    #[test]
    fn node_metadata_parse() {
        assert!(matches!(
            serde_json::from_str::<NodeMetadata>(JSON_ARRAY).unwrap(),
            NodeMetadata::Array(_)
        ));
        assert!(matches!(
            serde_json::from_str::<NodeMetadata>(JSON_GROUP).unwrap(),
            NodeMetadata::Group(_)
        ));
    }

    #[tokio::test]
    async fn node_kind_discovery() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store
            .set(&"group/zarr.json".try_into()?, JSON_GROUP.as_bytes())
            .await?;
        store
            .set(&"group/array/zarr.json".try_into()?, JSON_ARRAY.as_bytes())
            .await?;

        assert_eq!(
            node_kind(&store, &NodePath::new("/group")).await?,
            NodeKind::Group
        );
        assert_eq!(
            node_kind(&store, &NodePath::new("/group/array")).await?,
            NodeKind::Array
        );
        assert_eq!(
            node_kind(&store, &NodePath::new("/missing")).await?,
            NodeKind::Absent
        );
        Ok(())
    }

    #[tokio::test]
    async fn node_schema_conflict() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store
            .set(&"node/zarr.json".try_into()?, JSON_ARRAY.as_bytes())
            .await?;
        store
            .set(
                &"node/.zgroup".try_into()?,
                br#"{ "zarr_format": 2 }"#.as_slice(),
            )
            .await?;
        assert!(matches!(
            node_kind(&store, &NodePath::new("/node")).await,
            Err(NodeError::SchemaConflict(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn node_tree() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store
            .set(&"zarr.json".try_into()?, JSON_GROUP.as_bytes())
            .await?;
        store
            .set(&"b/zarr.json".try_into()?, JSON_GROUP.as_bytes())
            .await?;
        store
            .set(&"a/zarr.json".try_into()?, JSON_GROUP.as_bytes())
            .await?;
        store
            .set(&"a/foo/zarr.json".try_into()?, JSON_ARRAY.as_bytes())
            .await?;

        let node = Node::open(&store, "/").await?;
        assert_eq!(
            node.hierarchy_tree(),
            "/\n  a\n    foo [100] uint8\n  b\n"
        );
        Ok(())
    }
}
