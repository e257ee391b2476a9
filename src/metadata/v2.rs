//! Zarr V2 metadata documents and their conversion to the V3 model.
//!
//! A V2 array node is defined by a `.zarray` document ([`ArrayMetadataV2`])
//! and an optional `.zattrs` document holding user attributes; a V2 group by
//! a `.zgroup` document ([`GroupMetadataV2`]).
//!
//! Only the subset of Zarr V2 that is expressible in the V3 model is
//! supported: simple (non-structured) data types, C or F order, and
//! compressors with a V3 codec counterpart.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::array::{chunk_key_encoding::ChunkKeySeparator, Endianness};

use super::{
    v3::{FillValueFloat, FillValueMetadata},
    AdditionalFields, ArrayMetadataV3, ArrayShape, GroupMetadataV3, Metadata,
    MetadataConfiguration,
};

/// Zarr V2 array metadata, stored at a `.zarray` key.
///
/// An example `.zarray` document:
/// ```json
/// {
///     "zarr_format": 2,
///     "shape": [10000, 10000],
///     "chunks": [1000, 1000],
///     "dtype": "<f8",
///     "compressor": { "id": "gzip", "level": 5 },
///     "fill_value": "NaN",
///     "order": "C",
///     "filters": null
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadataV2 {
    /// An integer defining the version of the storage specification. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// An array of integers providing the length of each dimension of the array.
    pub shape: ArrayShape,
    /// A list of integers defining the length of each dimension of a chunk of the array.
    pub chunks: ArrayShape,
    /// The data type of the array, encoded with a `<`/`>`/`|` endianness prefix.
    pub dtype: String,
    /// The primary compression codec, or null if the chunks are not compressed.
    pub compressor: Option<MetadataV2>,
    /// The default value of uninitialised portions of the array, or null.
    pub fill_value: Option<FillValueMetadata>,
    /// Either `C` or `F`, defining the layout of bytes within each chunk of the array.
    pub order: ArrayMetadataV2Order,
    /// A list of codec configurations, or null if no filters are to be applied.
    #[serde(default)]
    pub filters: Option<Vec<MetadataV2>>,
    /// The separator placed between the dimensions of a chunk key, `.` if absent.
    #[serde(default = "chunk_key_separator_default_v2")]
    pub dimension_separator: ChunkKeySeparator,
    /// Optional user defined attributes contained in a separate `.zattrs` document.
    #[serde(skip)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Additional fields, preserved on re-serialisation.
    #[serde(flatten)]
    pub additional_fields: AdditionalFields,
}

const fn chunk_key_separator_default_v2() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

/// Zarr V2 group metadata, stored at a `.zgroup` key.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadataV2 {
    /// An integer defining the version of the storage specification. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// Optional user defined attributes contained in a separate `.zattrs` document.
    #[serde(skip)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Additional fields, preserved on re-serialisation.
    #[serde(flatten)]
    pub additional_fields: AdditionalFields,
}

impl Default for GroupMetadataV2 {
    fn default() -> Self {
        Self {
            zarr_format: monostate::MustBe!(2u64),
            attributes: serde_json::Map::new(),
            additional_fields: AdditionalFields::default(),
        }
    }
}

/// Zarr V2 codec metadata: an `id` with flattened configuration parameters.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct MetadataV2 {
    id: String,
    #[serde(flatten)]
    configuration: MetadataConfiguration,
}

impl MetadataV2 {
    /// Return the codec id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the codec configuration.
    #[must_use]
    pub const fn configuration(&self) -> &MetadataConfiguration {
        &self.configuration
    }
}

/// The layout of bytes within each chunk of a Zarr V2 array.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug)]
pub enum ArrayMetadataV2Order {
    /// Row-major order: the last dimension varies fastest.
    C,
    /// Column-major order: the first dimension varies fastest.
    F,
}

/// An error converting Zarr V2 array metadata to the V3 model.
#[derive(Debug, Error)]
pub enum MetadataV2ConversionError {
    /// Unsupported data type.
    #[error("unsupported V2 data type {_0:?}")]
    UnsupportedDataType(String),
    /// An unsupported codec.
    #[error("unsupported V2 codec {_0}")]
    UnsupportedCodec(String),
    /// Unsupported filters.
    #[error("V2 filters are not supported: {_0:?}")]
    UnsupportedFilters(Vec<String>),
    /// An unsupported fill value.
    #[error("unsupported V2 fill value {_0:?} for data type {_1}")]
    UnsupportedFillValue(FillValueMetadata, String),
    /// A serialisation or deserialisation error.
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
}

/// Convert a Zarr V2 `dtype` string to a V3 data type name, its size in
/// bytes, and its endianness.
///
/// # Errors
///
/// Returns [`MetadataV2ConversionError::UnsupportedDataType`] if the data
/// type has no V3 counterpart.
pub fn data_type_v2_to_v3(
    dtype: &str,
) -> Result<(String, usize, Option<Endianness>), MetadataV2ConversionError> {
    let unsupported = || MetadataV2ConversionError::UnsupportedDataType(dtype.to_string());
    let mut chars = dtype.chars();
    let prefix = chars.next().ok_or_else(unsupported)?;
    let endianness = match prefix {
        '<' => Some(Endianness::Little),
        '>' => Some(Endianness::Big),
        '|' => None,
        _ => return Err(unsupported()),
    };
    let rest: String = chars.collect();
    let (name, size) = match rest.as_str() {
        "b1" => ("bool", 1),
        "i1" => ("int8", 1),
        "i2" => ("int16", 2),
        "i4" => ("int32", 4),
        "i8" => ("int64", 8),
        "u1" => ("uint8", 1),
        "u2" => ("uint16", 2),
        "u4" => ("uint32", 4),
        "u8" => ("uint64", 8),
        "f2" => ("float16", 2),
        "f4" => ("float32", 4),
        "f8" => ("float64", 8),
        "c8" => ("complex64", 8),
        "c16" => ("complex128", 16),
        _ => {
            // Raw bits: |V<n>
            if let Some(length) = rest.strip_prefix('V') {
                let size: usize = length.parse().map_err(|_| unsupported())?;
                return Ok((format!("r{}", size * 8), size, endianness));
            }
            return Err(unsupported());
        }
    };
    Ok((name.to_string(), size, endianness))
}

/// Convert Zarr V2 group metadata to V3.
#[must_use]
pub fn group_metadata_v2_to_v3(group_metadata_v2: &GroupMetadataV2) -> GroupMetadataV3 {
    GroupMetadataV3::new(group_metadata_v2.attributes.clone())
}

fn fill_value_v2_default(data_type_name: &str, size: usize) -> FillValueMetadata {
    match data_type_name {
        "bool" => FillValueMetadata::Bool(false),
        "float16" | "float32" | "float64" | "bfloat16" => {
            FillValueMetadata::Float(FillValueFloat::Float(0.0))
        }
        "complex64" | "complex128" => FillValueMetadata::Complex(
            FillValueFloat::Float(0.0),
            FillValueFloat::Float(0.0),
        ),
        name if name.starts_with('r') => FillValueMetadata::ByteArray(vec![0; size]),
        _ => FillValueMetadata::UInt(0),
    }
}

/// Convert Zarr V2 array metadata to V3.
///
/// # Errors
///
/// Returns a [`MetadataV2ConversionError`] if the metadata is not compatible
/// with the V3 model.
pub fn array_metadata_v2_to_v3(
    metadata: &ArrayMetadataV2,
) -> Result<ArrayMetadataV3, MetadataV2ConversionError> {
    let (data_type_name, data_type_size, endianness) = data_type_v2_to_v3(&metadata.dtype)?;

    let chunk_grid = Metadata::new_with_serializable_configuration(
        "regular",
        &serde_json::json!({ "chunk_shape": metadata.chunks }),
    )?;

    let chunk_key_encoding = Metadata::new_with_serializable_configuration(
        "v2",
        &serde_json::json!({ "separator": metadata.dimension_separator }),
    )?;

    // Fill value: a null V2 fill value maps to the data type's zero.
    let mut fill_value = metadata
        .fill_value
        .clone()
        .unwrap_or_else(|| fill_value_v2_default(&data_type_name, data_type_size));
    if data_type_name == "bool" {
        fill_value = match fill_value {
            FillValueMetadata::UInt(0) | FillValueMetadata::Int(0) => FillValueMetadata::Bool(false),
            FillValueMetadata::UInt(1) | FillValueMetadata::Int(1) => FillValueMetadata::Bool(true),
            FillValueMetadata::Bool(value) => FillValueMetadata::Bool(value),
            other => {
                return Err(MetadataV2ConversionError::UnsupportedFillValue(
                    other,
                    data_type_name,
                ))
            }
        };
    }

    if let Some(filters) = &metadata.filters {
        if !filters.is_empty() {
            return Err(MetadataV2ConversionError::UnsupportedFilters(
                filters.iter().map(|filter| filter.id().to_string()).collect(),
            ));
        }
    }

    let mut codecs: Vec<Metadata> = vec![];

    // F-order chunks become a transpose codec ahead of the serialiser.
    if metadata.order == ArrayMetadataV2Order::F {
        let order: Vec<usize> = (0..metadata.shape.len()).rev().collect();
        codecs.push(Metadata::new_with_serializable_configuration(
            "transpose",
            &serde_json::json!({ "order": order }),
        )?);
    }

    codecs.push(Metadata::new_with_serializable_configuration(
        "bytes",
        &serde_json::json!({ "endian": endianness.unwrap_or(Endianness::Little) }),
    )?);

    if let Some(compressor) = &metadata.compressor {
        codecs.push(compressor_v2_to_v3(compressor, data_type_size)?);
    }

    Ok(ArrayMetadataV3::new(
        metadata.shape.clone(),
        Metadata::new(&data_type_name),
        chunk_grid,
        chunk_key_encoding,
        fill_value,
        codecs,
    )
    .with_attributes(metadata.attributes.clone()))
}

/// Convert a Zarr V2 (numcodecs) compressor to V3 codec metadata.
fn compressor_v2_to_v3(
    compressor: &MetadataV2,
    data_type_size: usize,
) -> Result<Metadata, MetadataV2ConversionError> {
    #[derive(Deserialize)]
    struct NumcodecsBlosc {
        cname: String,
        clevel: u8,
        shuffle: i64,
        #[serde(default)]
        blocksize: usize,
    }
    #[derive(Deserialize)]
    struct NumcodecsLevel {
        level: i64,
    }

    let configuration = serde_json::Value::Object(compressor.configuration().clone());
    match compressor.id() {
        "gzip" => {
            let gzip: NumcodecsLevel = serde_json::from_value(configuration)?;
            Ok(Metadata::new_with_serializable_configuration(
                "gzip",
                &serde_json::json!({ "level": gzip.level }),
            )?)
        }
        "zstd" => {
            let zstd: NumcodecsLevel = serde_json::from_value(configuration)?;
            Ok(Metadata::new_with_serializable_configuration(
                "zstd",
                &serde_json::json!({ "level": zstd.level, "checksum": false }),
            )?)
        }
        "blosc" => {
            let blosc: NumcodecsBlosc = serde_json::from_value(configuration)?;
            // numcodecs shuffle: 0 none, 1 byte, 2 bit, -1 auto (by item size).
            let shuffle = match blosc.shuffle {
                0 => "noshuffle",
                2 => "bitshuffle",
                -1 if data_type_size == 1 => "bitshuffle",
                _ => "shuffle",
            };
            let typesize = if shuffle == "noshuffle" {
                None
            } else {
                Some(data_type_size)
            };
            Ok(Metadata::new_with_serializable_configuration(
                "blosc",
                &serde_json::json!({
                    "cname": blosc.cname,
                    "clevel": blosc.clevel,
                    "shuffle": shuffle,
                    "typesize": typesize,
                    "blocksize": blosc.blocksize,
                }),
            )?)
        }
        other => Err(MetadataV2ConversionError::UnsupportedCodec(
            other.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_v2_to_v3() {
        let json = r#"{
            "chunks": [1000, 1000],
            "compressor": { "id": "blosc", "cname": "lz4", "clevel": 5, "shuffle": 1 },
            "dtype": "<f8",
            "fill_value": "NaN",
            "filters": null,
            "order": "F",
            "shape": [10000, 10000],
            "zarr_format": 2
        }"#;
        let v2: ArrayMetadataV2 = serde_json::from_str(json).unwrap();
        assert_eq!(v2.dimension_separator, ChunkKeySeparator::Dot);
        let v3 = array_metadata_v2_to_v3(&v2).unwrap();
        assert_eq!(v3.data_type.name(), "float64");
        assert_eq!(v3.codecs.len(), 3);
        assert_eq!(v3.codecs[0].name(), "transpose");
        assert_eq!(v3.codecs[1].name(), "bytes");
        assert_eq!(v3.codecs[2].name(), "blosc");
        assert_eq!(v3.chunk_key_encoding.name(), "v2");
    }

    #[test]
    fn array_v2_null_fill_value() {
        let json = r#"{
            "chunks": [2],
            "compressor": null,
            "dtype": "<u2",
            "fill_value": null,
            "order": "C",
            "shape": [4],
            "zarr_format": 2
        }"#;
        let v2: ArrayMetadataV2 = serde_json::from_str(json).unwrap();
        let v3 = array_metadata_v2_to_v3(&v2).unwrap();
        assert_eq!(v3.fill_value, FillValueMetadata::UInt(0));
    }

    #[test]
    fn dtype_parsing() {
        assert_eq!(
            data_type_v2_to_v3("<i4").unwrap(),
            ("int32".to_string(), 4, Some(Endianness::Little))
        );
        assert_eq!(
            data_type_v2_to_v3(">f4").unwrap(),
            ("float32".to_string(), 4, Some(Endianness::Big))
        );
        assert_eq!(
            data_type_v2_to_v3("|u1").unwrap(),
            ("uint8".to_string(), 1, None)
        );
        assert_eq!(
            data_type_v2_to_v3("|V3").unwrap(),
            ("r24".to_string(), 3, None)
        );
        assert!(data_type_v2_to_v3("<m8").is_err());
    }
}
