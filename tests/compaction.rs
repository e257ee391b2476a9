//! The erase-empty-chunks policy mutates the global configuration, so it gets
//! its own test binary.

use std::sync::Arc;

use gridstore::array::{ArrayBuilder, DataType, FillValue};
use gridstore::config::global_config_mut;
use gridstore::selection::ArraySelection;
use gridstore::storage::{MemoryStore, ReadableStorageTraits};

#[tokio::test]
async fn empty_chunks_are_erased_when_enabled() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![4],
        DataType::UInt8,
        vec![2].try_into()?,
        FillValue::from(0u8),
    )
    .build(store.clone(), "/array")?;
    array.store_metadata().await?;

    // Default policy: a chunk written as all fill values stays stored.
    array
        .store_selection(&ArraySelection::full(&[4]), &[0, 0, 7, 7])
        .await?;
    assert!(store.contains(&array.chunk_key(&[0])).await?);
    assert!(store.contains(&array.chunk_key(&[1])).await?);

    // With compaction enabled, reverting a chunk to the fill value erases it.
    global_config_mut().set_erase_empty_chunks(true);
    array
        .store_selection(&ArraySelection::full(&[4]), &[0, 0, 0, 0])
        .await?;
    global_config_mut().set_erase_empty_chunks(false);
    assert!(!store.contains(&array.chunk_key(&[0])).await?);
    assert!(!store.contains(&array.chunk_key(&[1])).await?);

    // A missing chunk and a stored all-fill chunk read identically.
    let out = array.retrieve_selection(&ArraySelection::full(&[4])).await?;
    assert_eq!(out, vec![0; 4]);
    Ok(())
}
