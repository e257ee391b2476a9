#![cfg(feature = "sharding")]

use std::sync::Arc;

use gridstore::array::codec::sharding::{ShardingCodec, ShardingIndexLocation};
use gridstore::array::codec::{BytesCodec, Codec, CodecChain};
use gridstore::array::{ArrayBuilder, DataType, FillValue};
use gridstore::selection::ArraySelection;
use gridstore::storage::{MemoryStore, ReadableStorageTraits};

fn bytes_chain() -> CodecChain {
    CodecChain::new(vec![Codec::ArrayToBytes(Arc::new(BytesCodec::little()))]).unwrap()
}

#[tokio::test]
async fn sharded_array_write_read() -> Result<(), Box<dyn std::error::Error>> {
    // shape [8], chunks (shards) [8], inner chunks [2], fill 0.
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![8],
        DataType::UInt8,
        vec![8].try_into()?,
        FillValue::from(0u8),
    )
    .array_to_bytes_codec(Arc::new(ShardingCodec::new(
        vec![2].try_into()?,
        bytes_chain(),
        bytes_chain(),
        ShardingIndexLocation::End,
    )))
    .build(store.clone(), "/array")?;
    array.store_metadata().await?;

    let values = vec![0u8, 0, 0, 0, 5, 6, 0, 0];
    array
        .store_selection(&ArraySelection::full(&[8]), &values)
        .await?;
    let out = array.retrieve_selection(&ArraySelection::full(&[8])).await?;
    assert_eq!(out, values);

    // The shard index holds exactly one non-empty entry, for inner chunk 2.
    let shard = store
        .get(&array.chunk_key(&[0]))
        .await?
        .expect("the shard is stored");
    let index_bytes = &shard[shard.len() - 4 * 2 * 8..];
    let index: Vec<u64> = index_bytes
        .chunks_exact(8)
        .map(|entry| u64::from_le_bytes(entry.try_into().unwrap()))
        .collect();
    for inner in 0..4 {
        let (offset, nbytes) = (index[inner * 2], index[inner * 2 + 1]);
        if inner == 2 {
            assert_eq!((offset, nbytes), (0, 2));
        } else {
            assert_eq!((offset, nbytes), (u64::MAX, u64::MAX));
        }
    }
    Ok(())
}

#[tokio::test]
async fn sharded_array_partial_read() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![4, 4],
        DataType::UInt16,
        vec![4, 4].try_into()?,
        FillValue::from(0u16),
    )
    .array_to_bytes_codec(Arc::new(ShardingCodec::new(
        vec![2, 2].try_into()?,
        bytes_chain(),
        bytes_chain(),
        ShardingIndexLocation::End,
    )))
    .build(store, "/array")?;
    array.store_metadata().await?;

    let values: Vec<u16> = (0..16).collect();
    array
        .store_selection_elements(&ArraySelection::full(&[4, 4]), &values)
        .await?;

    // A selection inside the shard only decodes the inner chunks it touches.
    let selection = ArraySelection::new_with_ranges(&[1..3, 1..3]);
    let out: Vec<u16> = array.retrieve_selection_elements(&selection).await?;
    assert_eq!(out, vec![5, 6, 9, 10]);
    Ok(())
}

#[cfg(feature = "crc32c")]
#[tokio::test]
async fn sharded_with_checksummed_index() -> Result<(), Box<dyn std::error::Error>> {
    use gridstore::array::codec::Crc32cCodec;

    let index_chain = CodecChain::new(vec![
        Codec::ArrayToBytes(Arc::new(BytesCodec::little())),
        Codec::BytesToBytes(Arc::new(Crc32cCodec::new())),
    ])?;
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![4],
        DataType::UInt8,
        vec![4].try_into()?,
        FillValue::from(0u8),
    )
    .array_to_bytes_codec(Arc::new(ShardingCodec::new(
        vec![2].try_into()?,
        bytes_chain(),
        index_chain,
        ShardingIndexLocation::Start,
    )))
    .build(store, "/array")?;
    array.store_metadata().await?;

    let values = vec![9u8, 8, 7, 6];
    array
        .store_selection(&ArraySelection::full(&[4]), &values)
        .await?;
    let out = array.retrieve_selection(&ArraySelection::full(&[4])).await?;
    assert_eq!(out, values);

    // Partial reads go through the index at the start of the shard.
    let out = array
        .retrieve_selection(&ArraySelection::new_with_ranges(&[1..3]))
        .await?;
    assert_eq!(out, vec![8, 7]);
    Ok(())
}
