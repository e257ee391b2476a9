use std::sync::Arc;

use gridstore::array::{Array, ArrayBuilder, ArrayError, DataType, FillValue};
use gridstore::selection::{ArraySelection, SliceSpec};
use gridstore::storage::{FilesystemStore, MemoryStore};

#[tokio::test]
async fn strided_read_over_chunk_boundaries() -> Result<(), Box<dyn std::error::Error>> {
    // 1D int32 array, shape [10], chunks [3], fill 0.
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![10],
        DataType::Int32,
        vec![3].try_into()?,
        FillValue::from(0i32),
    )
    .build(store, "/array")?;
    array.store_metadata().await?;

    let values: Vec<i32> = (0..10).collect();
    array
        .store_selection_elements(&ArraySelection::full(array.shape()), &values)
        .await?;

    let selection = ArraySelection::normalise(&[SliceSpec::new(Some(2), Some(8), 2)], &[10])?;
    let out: Vec<i32> = array.retrieve_selection_elements(&selection).await?;
    assert_eq!(out, vec![2, 4, 6]);
    Ok(())
}

#[tokio::test]
async fn partial_write_preserves_fill_value() -> Result<(), Box<dyn std::error::Error>> {
    // 2D float64 array, shape [4, 4], chunks [2, 2], fill NaN.
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![4, 4],
        DataType::Float64,
        vec![2, 2].try_into()?,
        FillValue::from(f64::NAN),
    )
    .build(store, "/array")?;
    array.store_metadata().await?;

    let selection = ArraySelection::new_with_ranges(&[1..3, 1..3]);
    array
        .store_selection_elements(&selection, &[1.0f64; 4])
        .await?;

    let out: Vec<f64> = array
        .retrieve_selection_elements(&ArraySelection::full(array.shape()))
        .await?;
    assert_eq!(out.len(), 16);
    for row in 0..4 {
        for col in 0..4 {
            let value = out[row * 4 + col];
            if (1..3).contains(&row) && (1..3).contains(&col) {
                assert_eq!(value, 1.0);
            } else {
                assert!(value.is_nan());
            }
        }
    }
    Ok(())
}

#[cfg(feature = "gzip")]
#[tokio::test]
async fn compressed_roundtrip_through_reopen() -> Result<(), Box<dyn std::error::Error>> {
    // 1D uint8 array, shape [5], chunks [2], codecs [bytes(little), gzip(5)].
    let path = tempfile::TempDir::new()?;
    let store = Arc::new(FilesystemStore::new(path.path())?);
    let array = ArrayBuilder::new(
        vec![5],
        DataType::UInt8,
        vec![2].try_into()?,
        FillValue::from(0u8),
    )
    .bytes_to_bytes_codecs(vec![Arc::new(
        gridstore::array::codec::GzipCodec::new(5)?,
    )])
    .build(store.clone(), "/array")?;
    array.store_metadata().await?;
    array
        .store_selection(&ArraySelection::full(&[5]), &[1, 2, 3, 4, 5])
        .await?;
    drop(array);

    let array = Array::open(store, "/array").await?;
    let out = array.retrieve_selection(&ArraySelection::full(&[5])).await?;
    assert_eq!(out, vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[tokio::test]
async fn missing_chunks_read_as_fill_value() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![6],
        DataType::UInt16,
        vec![2].try_into()?,
        FillValue::from(42u16),
    )
    .build(store, "/array")?;
    array.store_metadata().await?;

    // Nothing has been written: every chunk is absent.
    let out: Vec<u16> = array
        .retrieve_selection_elements(&ArraySelection::full(&[6]))
        .await?;
    assert_eq!(out, vec![42; 6]);
    assert_eq!(array.retrieve_chunk_if_exists(&[1]).await?, None);
    assert_eq!(
        array.retrieve_chunk_elements::<u16>(&[1]).await?,
        vec![42, 42]
    );
    Ok(())
}

#[tokio::test]
async fn set_then_get_is_identity() -> Result<(), Box<dyn std::error::Error>> {
    // Writes through one selection read back identically through the same
    // selection, for aligned, unaligned, and strided selections.
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![7, 5],
        DataType::Int64,
        vec![3, 2].try_into()?,
        FillValue::from(-1i64),
    )
    .build(store, "/array")?;
    array.store_metadata().await?;

    let selections = [
        ArraySelection::new_with_ranges(&[0..3, 0..2]),
        ArraySelection::new_with_ranges(&[1..6, 1..4]),
        ArraySelection::normalise(
            &[SliceSpec::new(Some(0), Some(7), 3), SliceSpec::new(Some(1), None, 2)],
            &[7, 5],
        )?,
    ];
    for (seed, selection) in selections.iter().enumerate() {
        let values: Vec<i64> = (0..selection.num_elements() as i64)
            .map(|v| v + seed as i64 * 1000)
            .collect();
        array.store_selection_elements(selection, &values).await?;
        let out: Vec<i64> = array.retrieve_selection_elements(selection).await?;
        assert_eq!(out, values);
    }
    Ok(())
}

#[tokio::test]
async fn validation_fails_before_io() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![4],
        DataType::UInt8,
        vec![2].try_into()?,
        FillValue::from(0u8),
    )
    .build(store, "/array")?;
    array.store_metadata().await?;

    // Out of bounds selection.
    assert!(matches!(
        array
            .retrieve_selection(&ArraySelection::new_with_ranges(&[0..5]))
            .await,
        Err(ArrayError::InvalidArraySelection(..))
    ));
    // Buffer size mismatch.
    assert!(matches!(
        array
            .store_selection(&ArraySelection::new_with_ranges(&[0..2]), &[0; 3])
            .await,
        Err(ArrayError::InvalidBytesInputSize(3, 2))
    ));
    // Element type mismatch.
    assert!(matches!(
        array
            .retrieve_selection_elements::<u32>(&ArraySelection::full(&[4]))
            .await,
        Err(ArrayError::IncompatibleElementType(_))
    ));
    // Invalid chunk indices.
    assert!(matches!(
        array.retrieve_chunk(&[7]).await,
        Err(ArrayError::InvalidChunkGridIndices(_))
    ));
    Ok(())
}

#[test]
fn blocking_facade() -> Result<(), Box<dyn std::error::Error>> {
    gridstore::bridge::initialise();
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![4],
        DataType::Float32,
        vec![2].try_into()?,
        FillValue::from(0.0f32),
    )
    .build(store, "/array")?;
    array.store_metadata_blocking()?;
    array.store_selection_elements_blocking(
        &ArraySelection::full(&[4]),
        &[1.0f32, 2.0, 3.0, 4.0],
    )?;
    let out: Vec<f32> =
        array.retrieve_selection_elements_blocking(&ArraySelection::full(&[4]))?;
    assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[cfg(feature = "transpose")]
#[tokio::test]
async fn transpose_codec_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    use gridstore::array::codec::transpose::{TransposeCodec, TransposeOrder};

    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![4, 6],
        DataType::UInt32,
        vec![2, 3].try_into()?,
        FillValue::from(0u32),
    )
    .array_to_array_codecs(vec![Arc::new(TransposeCodec::new(TransposeOrder::new(
        &[1, 0],
    )?))])
    .build(store, "/array")?;
    array.store_metadata().await?;

    let values: Vec<u32> = (0..24).collect();
    array
        .store_selection_elements(&ArraySelection::full(&[4, 6]), &values)
        .await?;
    let out: Vec<u32> = array
        .retrieve_selection_elements(&ArraySelection::full(&[4, 6]))
        .await?;
    assert_eq!(out, values);

    // A partial read crossing chunk boundaries decodes identically.
    let selection = ArraySelection::new_with_ranges(&[1..3, 2..5]);
    let out: Vec<u32> = array.retrieve_selection_elements(&selection).await?;
    assert_eq!(out, vec![8, 9, 10, 14, 15, 16]);
    Ok(())
}
