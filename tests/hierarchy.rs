use std::sync::Arc;

use gridstore::array::{ArrayBuilder, DataType, FillValue};
use gridstore::group::{Child, Group, GroupError};
use gridstore::node::{contains_array, contains_group, Node, NodePath};
use gridstore::storage::MemoryStore;

fn array_metadata() -> gridstore::array::ArrayMetadata {
    serde_json::from_str(
        r#"{
            "zarr_format": 3,
            "node_type": "array",
            "shape": [10],
            "data_type": "float32",
            "chunk_grid": { "name": "regular", "configuration": { "chunk_shape": [5] } },
            "chunk_key_encoding": { "name": "default", "configuration": { "separator": "/" } },
            "fill_value": 0.0,
            "codecs": [{ "name": "bytes", "configuration": { "endian": "little" } }]
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn group_keys_are_lexicographic() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let root = Group::create(store.clone(), "/").await?;
    root.create_group("foo").await?;
    root.create_group("bar").await?;
    root.create_group("baz").await?;

    assert_eq!(root.group_keys().await?, vec!["bar", "baz", "foo"]);
    // The ordering is stable across repeated listings.
    assert_eq!(root.group_keys().await?, vec!["bar", "baz", "foo"]);
    assert!(root.array_keys().await?.is_empty());

    root.create_array("an_array", array_metadata()).await?;
    assert_eq!(root.array_keys().await?, vec!["an_array"]);
    assert_eq!(
        root.child_names().await?,
        vec!["an_array", "bar", "baz", "foo"]
    );
    Ok(())
}

#[tokio::test]
async fn create_group_over_array_fails() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![10],
        DataType::Float32,
        vec![5].try_into()?,
        FillValue::from(0.0f32),
    )
    .build(store.clone(), "/data")?;
    array.store_metadata().await?;

    assert!(matches!(
        Group::create(store.clone(), "/data").await,
        Err(GroupError::ContainsArray(_))
    ));
    // An array on the parent chain is also rejected.
    assert!(matches!(
        Group::create(store, "/data/nested").await,
        Err(GroupError::ContainsArray(_))
    ));
    Ok(())
}

#[tokio::test]
async fn node_kinds_are_exclusive() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let root = Group::create(store.clone(), "/").await?;
    root.create_group("group").await?;
    root.create_array("array", array_metadata()).await?;

    for path in ["/", "/group", "/array", "/missing"] {
        let path = NodePath::new(path);
        let is_array = contains_array(&*store, &path).await?;
        let is_group = contains_group(&*store, &path).await?;
        assert!(!(is_array && is_group));
    }
    Ok(())
}

#[tokio::test]
async fn child_dispatches_on_node_kind() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let root = Group::create(store.clone(), "/").await?;
    root.create_group("group").await?;
    root.create_array("array", array_metadata()).await?;

    assert!(matches!(root.child("group").await?, Child::Group(_)));
    match root.child("array").await? {
        Child::Array(array) => assert_eq!(array.shape(), &[10]),
        Child::Group(_) => panic!("expected an array"),
    }
    assert!(matches!(
        root.child("missing").await,
        Err(GroupError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn hierarchy_tree() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let root = Group::create(store.clone(), "/").await?;
    let a = root.create_group("a").await?;
    a.create_array("foo", array_metadata()).await?;
    root.create_group("b").await?;

    let node = Node::open(&*store, "/").await?;
    assert_eq!(node.hierarchy_tree(), "/\n  a\n    foo [10] float32\n  b\n");
    Ok(())
}

#[tokio::test]
async fn erase_group_is_transitive() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let root = Group::create(store.clone(), "/").await?;
    let a = root.create_group("a").await?;
    a.create_array("foo", array_metadata()).await?;

    assert!(a.erase().await?);
    assert_eq!(root.child_names().await?, Vec::<String>::new());
    assert!(matches!(
        root.child("a").await,
        Err(GroupError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn invalid_child_names_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let root = Group::create(store.clone(), "/").await?;
    assert!(root.create_group("__reserved").await.is_err());
    Ok(())
}
