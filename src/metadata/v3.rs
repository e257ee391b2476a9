//! Zarr V3 metadata documents.
//!
//! An array node is defined by a single `zarr.json` document ([`ArrayMetadataV3`]);
//! a group node by a `zarr.json` document with `"node_type": "group"`
//! ([`GroupMetadataV3`]).

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use super::{AdditionalFields, ArrayShape, Metadata};

/// Zarr V3 array metadata.
///
/// An example `zarr.json` document for an array:
/// ```json
/// {
///     "zarr_format": 3,
///     "node_type": "array",
///     "shape": [10000, 1000],
///     "data_type": "float64",
///     "chunk_grid": {
///         "name": "regular",
///         "configuration": { "chunk_shape": [1000, 100] }
///     },
///     "chunk_key_encoding": {
///         "name": "default",
///         "configuration": { "separator": "/" }
///     },
///     "fill_value": "NaN",
///     "codecs": [
///         { "name": "bytes", "configuration": { "endian": "little" } },
///         { "name": "gzip", "configuration": { "level": 1 } }
///     ],
///     "attributes": { "spam": "ham" },
///     "dimension_names": ["rows", "columns"]
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadataV3 {
    /// An integer defining the version of the storage specification. Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// A string defining the type of hierarchy node. Must be `array`.
    pub node_type: monostate::MustBe!("array"),
    /// An array of integers providing the length of each dimension of the array.
    pub shape: ArrayShape,
    /// The data type of the array.
    pub data_type: Metadata,
    /// The chunk grid of the array.
    pub chunk_grid: Metadata,
    /// The mapping from chunk grid cell coordinates to keys in the underlying store.
    pub chunk_key_encoding: Metadata,
    /// The element value used for uninitialised portions of the array.
    pub fill_value: FillValueMetadata,
    /// The codecs used for encoding and decoding chunks.
    pub codecs: Vec<Metadata>,
    /// Optional user defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// An optional list of dimension names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_names: Option<Vec<Option<String>>>,
    /// Additional fields, preserved on re-serialisation.
    #[serde(flatten)]
    pub additional_fields: AdditionalFields,
}

impl ArrayMetadataV3 {
    /// Create new array metadata.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        data_type: Metadata,
        chunk_grid: Metadata,
        chunk_key_encoding: Metadata,
        fill_value: FillValueMetadata,
        codecs: Vec<Metadata>,
    ) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("array"),
            shape,
            data_type,
            chunk_grid,
            chunk_key_encoding,
            fill_value,
            codecs,
            attributes: serde_json::Map::new(),
            dimension_names: None,
            additional_fields: AdditionalFields::default(),
        }
    }

    /// Set the user defined attributes.
    #[must_use]
    pub fn with_attributes(
        mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the dimension names.
    #[must_use]
    pub fn with_dimension_names(mut self, dimension_names: Option<Vec<Option<String>>>) -> Self {
        self.dimension_names = dimension_names;
        self
    }
}

/// Zarr V3 group metadata.
///
/// An example `zarr.json` document for a group:
/// ```json
/// {
///     "zarr_format": 3,
///     "node_type": "group",
///     "attributes": { "spam": "ham", "eggs": 42 }
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadataV3 {
    /// An integer defining the version of the storage specification. Must be `3`.
    pub zarr_format: monostate::MustBe!(3u64),
    /// A string defining the type of hierarchy node. Must be `group`.
    pub node_type: monostate::MustBe!("group"),
    /// Optional user defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Additional fields, preserved on re-serialisation.
    #[serde(flatten)]
    pub additional_fields: AdditionalFields,
}

impl Default for GroupMetadataV3 {
    fn default() -> Self {
        Self::new(serde_json::Map::new())
    }
}

impl GroupMetadataV3 {
    /// Create new group metadata with `attributes`.
    #[must_use]
    pub fn new(attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            zarr_format: monostate::MustBe!(3u64),
            node_type: monostate::MustBe!("group"),
            attributes,
            additional_fields: AdditionalFields::default(),
        }
    }
}

/// Fill value metadata.
///
/// The interpretation of a fill value is data type dependent; see
/// [`DataType::fill_value_from_metadata`](crate::array::DataType::fill_value_from_metadata).
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[serde(untagged)]
pub enum FillValueMetadata {
    /// A boolean value.
    Bool(bool),
    /// An unsigned integer.
    UInt(u64),
    /// A signed integer.
    Int(i64),
    /// A float.
    Float(FillValueFloat),
    /// An array of integers. Suitable for raw (`r<N>`) data types and complex components.
    #[display("{_0:?}")]
    ByteArray(Vec<u8>),
    /// A complex number, as a two-element array of real and imaginary components.
    #[display("{{re:{_0}, im:{_1}}}")]
    Complex(FillValueFloat, FillValueFloat),
    /// An unsupported fill value.
    Unsupported(serde_json::Value),
}

/// A float fill value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, From, Display)]
#[serde(untagged)]
pub enum FillValueFloat {
    /// A finite float number.
    Float(f64),
    /// A hex string specifying the byte representation of the float as an unsigned integer.
    HexString(HexString),
    /// A string representation of a non finite value.
    NonFinite(FillValueFloatStringNonFinite),
}

impl FillValueFloat {
    /// Convert to an `f64`, if possible.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Float(float) => Some(*float),
            Self::HexString(hex_string) => {
                let bytes = hex_string.as_be_bytes();
                match bytes.len() {
                    4 => Some(f64::from(f32::from_be_bytes(bytes.try_into().ok()?))),
                    8 => Some(f64::from_be_bytes(bytes.try_into().ok()?)),
                    _ => None,
                }
            }
            Self::NonFinite(nonfinite) => Some(nonfinite.to_f64()),
        }
    }
}

/// A hex string of the form `"0xYYYYYYYY"` holding a big-endian byte representation.
#[derive(Debug, Clone, Eq, PartialEq, From)]
pub struct HexString(Vec<u8>);

impl HexString {
    /// Return the big-endian bytes of the hex string.
    #[must_use]
    pub fn as_be_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Display for HexString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

fn bytes_from_hex_string(string: &str) -> Option<Vec<u8>> {
    let string = string.strip_prefix("0x")?;
    if string.len() % 2 != 0 {
        return None;
    }
    (0..string.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&string[i..i + 2], 16).ok())
        .collect()
}

impl serde::Serialize for HexString {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for HexString {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let string = String::deserialize(d)?;
        bytes_from_hex_string(&string)
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom("not a valid hex string"))
    }
}

/// A string representation of a non finite float.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Display)]
pub enum FillValueFloatStringNonFinite {
    /// Positive infinity.
    #[serde(rename = "Infinity")]
    PosInfinity,
    /// Negative infinity.
    #[serde(rename = "-Infinity")]
    NegInfinity,
    /// NaN (not-a-number).
    #[serde(rename = "NaN")]
    NaN,
}

impl FillValueFloatStringNonFinite {
    /// Convert to an `f64`.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        match self {
            Self::PosInfinity => f64::INFINITY,
            Self::NegInfinity => f64::NEG_INFINITY,
            Self::NaN => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_metadata_roundtrip_preserves_unknown_fields() {
        let json = r#"{
            "zarr_format": 3,
            "node_type": "array",
            "shape": [10, 10],
            "data_type": "float64",
            "chunk_grid": { "name": "regular", "configuration": { "chunk_shape": [5, 5] } },
            "chunk_key_encoding": { "name": "default", "configuration": { "separator": "/" } },
            "fill_value": "NaN",
            "codecs": [{ "name": "bytes", "configuration": { "endian": "little" } }],
            "custom_extension": { "must_understand": false, "setting": 1 }
        }"#;
        let metadata: ArrayMetadataV3 = serde_json::from_str(json).unwrap();
        assert!(metadata
            .additional_fields
            .as_map()
            .contains_key("custom_extension"));
        let roundtrip = serde_json::to_string(&metadata).unwrap();
        let metadata2: ArrayMetadataV3 = serde_json::from_str(&roundtrip).unwrap();
        assert_eq!(metadata, metadata2);
    }

    #[test]
    fn group_metadata() {
        let json = r#"{
            "zarr_format": 3,
            "node_type": "group",
            "attributes": { "spam": "ham", "eggs": 42 }
        }"#;
        let metadata: GroupMetadataV3 = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.attributes["eggs"], 42);
        let roundtrip: GroupMetadataV3 =
            serde_json::from_str(&serde_json::to_string(&metadata).unwrap()).unwrap();
        assert_eq!(metadata, roundtrip);
    }

    #[test]
    fn fill_value_metadata_variants() {
        assert!(matches!(
            serde_json::from_str::<FillValueMetadata>("true").unwrap(),
            FillValueMetadata::Bool(true)
        ));
        assert!(matches!(
            serde_json::from_str::<FillValueMetadata>("7").unwrap(),
            FillValueMetadata::UInt(7)
        ));
        assert!(matches!(
            serde_json::from_str::<FillValueMetadata>("-7").unwrap(),
            FillValueMetadata::Int(-7)
        ));
        assert!(matches!(
            serde_json::from_str::<FillValueMetadata>("1.5").unwrap(),
            FillValueMetadata::Float(FillValueFloat::Float(_))
        ));
        let nan: FillValueMetadata = serde_json::from_str(r#""NaN""#).unwrap();
        assert!(matches!(
            nan,
            FillValueMetadata::Float(FillValueFloat::NonFinite(
                FillValueFloatStringNonFinite::NaN
            ))
        ));
        let hex: FillValueMetadata = serde_json::from_str(r#""0x7fc00000""#).unwrap();
        if let FillValueMetadata::Float(FillValueFloat::HexString(hex)) = &hex {
            assert_eq!(hex.as_be_bytes(), &[0x7f, 0xc0, 0x00, 0x00]);
        } else {
            panic!("expected a hex string");
        }
    }
}
