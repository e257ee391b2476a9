//! Data types.
//!
//! The set of supported data types is closed: the primitive numeric types of
//! the Zarr V3 core specification plus `bfloat16` and the raw bits (`r<N>`)
//! family.

use derive_more::Display;
use half::{bf16, f16};
use thiserror::Error;

use crate::metadata::{
    v3::{FillValueFloat, FillValueFloatStringNonFinite, FillValueMetadata},
    Metadata,
};

use super::{
    fill_value::{ZARR_NAN_BF16, ZARR_NAN_F16, ZARR_NAN_F32, ZARR_NAN_F64},
    FillValue,
};

/// A data type.
#[derive(Clone, Eq, PartialEq, Debug, Display)]
#[non_exhaustive]
pub enum DataType {
    /// `bool` Boolean.
    #[display("bool")]
    Bool,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    #[display("int8")]
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    #[display("int16")]
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    #[display("int32")]
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    #[display("int64")]
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    #[display("uint8")]
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    #[display("uint16")]
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    #[display("uint32")]
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    #[display("uint64")]
    UInt64,
    /// `float16` IEEE 754 half-precision floating point.
    #[display("float16")]
    Float16,
    /// `float32` IEEE 754 single-precision floating point.
    #[display("float32")]
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    #[display("float64")]
    Float64,
    /// `bfloat16` brain floating point.
    #[display("bfloat16")]
    BFloat16,
    /// `complex64` real and imaginary components are each `float32`.
    #[display("complex64")]
    Complex64,
    /// `complex128` real and imaginary components are each `float64`.
    #[display("complex128")]
    Complex128,
    /// `r*` raw bits, with a size in bytes.
    #[display("r{}", _0 * 8)]
    RawBits(usize),
}

/// An unsupported data type error.
#[derive(Debug, Error)]
#[error("data type {0} is not supported")]
pub struct UnsupportedDataTypeError(String);

/// A fill value metadata incompatibility error.
#[derive(Debug, Error)]
#[error("incompatible fill value {1} for data type {0}")]
pub struct IncompatibleFillValueMetadataError(String, FillValueMetadata);

impl DataType {
    /// The identifier of the data type.
    #[must_use]
    pub fn identifier(&self) -> String {
        self.to_string()
    }

    /// The size of an element in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
            Self::RawBits(size) => *size,
        }
    }

    /// Create a data type from metadata.
    ///
    /// # Errors
    ///
    /// Returns an [`UnsupportedDataTypeError`] if the metadata is not a
    /// recognised data type name without configuration.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, UnsupportedDataTypeError> {
        if !metadata.configuration_is_none_or_empty() {
            return Err(UnsupportedDataTypeError(metadata.name().to_string()));
        }
        let name = metadata.name();
        match name {
            "bool" => Ok(Self::Bool),
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "uint8" => Ok(Self::UInt8),
            "uint16" => Ok(Self::UInt16),
            "uint32" => Ok(Self::UInt32),
            "uint64" => Ok(Self::UInt64),
            "float16" => Ok(Self::Float16),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            "bfloat16" => Ok(Self::BFloat16),
            "complex64" => Ok(Self::Complex64),
            "complex128" => Ok(Self::Complex128),
            _ => {
                if let Some(bits) = name.strip_prefix('r') {
                    if let Ok(bits) = bits.parse::<usize>() {
                        if bits > 0 && bits % 8 == 0 {
                            return Ok(Self::RawBits(bits / 8));
                        }
                    }
                }
                Err(UnsupportedDataTypeError(name.to_string()))
            }
        }
    }

    /// The metadata of the data type.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata::new(&self.identifier())
    }

    /// Create a fill value from its metadata.
    ///
    /// # Errors
    ///
    /// Returns an [`IncompatibleFillValueMetadataError`] if the fill value is
    /// incompatible with the data type.
    #[allow(clippy::too_many_lines)]
    pub fn fill_value_from_metadata(
        &self,
        fill_value: &FillValueMetadata,
    ) -> Result<FillValue, IncompatibleFillValueMetadataError> {
        use FillValueMetadata as FV;
        let err = || IncompatibleFillValueMetadataError(self.identifier(), fill_value.clone());

        match self {
            Self::Bool => match fill_value {
                FV::Bool(value) => Ok(FillValue::from(*value)),
                _ => Err(err()),
            },
            Self::Int8 => int_fill_value(fill_value).ok_or_else(err).map(|v: i8| v.into()),
            Self::Int16 => int_fill_value(fill_value).ok_or_else(err).map(|v: i16| v.into()),
            Self::Int32 => int_fill_value(fill_value).ok_or_else(err).map(|v: i32| v.into()),
            Self::Int64 => int_fill_value(fill_value).ok_or_else(err).map(|v: i64| v.into()),
            Self::UInt8 => uint_fill_value(fill_value).ok_or_else(err).map(|v: u8| v.into()),
            Self::UInt16 => uint_fill_value(fill_value).ok_or_else(err).map(|v: u16| v.into()),
            Self::UInt32 => uint_fill_value(fill_value).ok_or_else(err).map(|v: u32| v.into()),
            Self::UInt64 => uint_fill_value(fill_value).ok_or_else(err).map(|v: u64| v.into()),
            Self::Float16 => match fill_value {
                FV::Float(float) => f16_from_float(float).ok_or_else(err).map(FillValue::from),
                FV::UInt(value) => Ok(FillValue::from(f16::from_f64(*value as f64))),
                FV::Int(value) => Ok(FillValue::from(f16::from_f64(*value as f64))),
                _ => Err(err()),
            },
            Self::BFloat16 => match fill_value {
                FV::Float(float) => bf16_from_float(float).ok_or_else(err).map(FillValue::from),
                FV::UInt(value) => Ok(FillValue::from(bf16::from_f64(*value as f64))),
                FV::Int(value) => Ok(FillValue::from(bf16::from_f64(*value as f64))),
                _ => Err(err()),
            },
            Self::Float32 => match fill_value {
                FV::Float(float) => f32_from_float(float).ok_or_else(err).map(FillValue::from),
                FV::UInt(value) => Ok(FillValue::from(*value as f32)),
                FV::Int(value) => Ok(FillValue::from(*value as f32)),
                _ => Err(err()),
            },
            Self::Float64 => match fill_value {
                FV::Float(float) => f64_from_float(float).ok_or_else(err).map(FillValue::from),
                FV::UInt(value) => Ok(FillValue::from(*value as f64)),
                FV::Int(value) => Ok(FillValue::from(*value as f64)),
                _ => Err(err()),
            },
            Self::Complex64 => {
                let (re, im) = complex_components(fill_value).ok_or_else(err)?;
                let re = f32_from_float(&re).ok_or_else(err)?;
                let im = f32_from_float(&im).ok_or_else(err)?;
                Ok(FillValue::from(num_complex::Complex32::new(re, im)))
            }
            Self::Complex128 => {
                let (re, im) = complex_components(fill_value).ok_or_else(err)?;
                let re = f64_from_float(&re).ok_or_else(err)?;
                let im = f64_from_float(&im).ok_or_else(err)?;
                Ok(FillValue::from(num_complex::Complex64::new(re, im)))
            }
            Self::RawBits(size) => match fill_value {
                FV::ByteArray(bytes) if bytes.len() == *size => {
                    Ok(FillValue::new(bytes.clone()))
                }
                _ => Err(err()),
            },
        }
    }

    /// Create fill value metadata from a fill value.
    ///
    /// # Panics
    ///
    /// Panics if the fill value size does not match the data type size.
    #[must_use]
    pub fn metadata_fill_value(&self, fill_value: &FillValue) -> FillValueMetadata {
        use FillValueMetadata as FV;
        assert_eq!(fill_value.size(), self.size());
        let bytes = fill_value.as_ne_bytes();
        match self {
            Self::Bool => FV::Bool(bytes[0] != 0),
            Self::Int8 => FV::Int(i64::from(i8::from_ne_bytes(bytes.try_into().unwrap()))),
            Self::Int16 => FV::Int(i64::from(i16::from_ne_bytes(bytes.try_into().unwrap()))),
            Self::Int32 => FV::Int(i64::from(i32::from_ne_bytes(bytes.try_into().unwrap()))),
            Self::Int64 => FV::Int(i64::from_ne_bytes(bytes.try_into().unwrap())),
            Self::UInt8 => FV::UInt(u64::from(u8::from_ne_bytes(bytes.try_into().unwrap()))),
            Self::UInt16 => FV::UInt(u64::from(u16::from_ne_bytes(bytes.try_into().unwrap()))),
            Self::UInt32 => FV::UInt(u64::from(u32::from_ne_bytes(bytes.try_into().unwrap()))),
            Self::UInt64 => FV::UInt(u64::from_ne_bytes(bytes.try_into().unwrap())),
            Self::Float16 => {
                let value = f16::from_ne_bytes(bytes.try_into().unwrap());
                FV::Float(float_to_metadata(
                    f64::from(value),
                    value.is_nan(),
                    value.to_bits() == ZARR_NAN_F16.to_bits(),
                    &value.to_be_bytes(),
                ))
            }
            Self::BFloat16 => {
                let value = bf16::from_ne_bytes(bytes.try_into().unwrap());
                FV::Float(float_to_metadata(
                    f64::from(value),
                    value.is_nan(),
                    value.to_bits() == ZARR_NAN_BF16.to_bits(),
                    &value.to_be_bytes(),
                ))
            }
            Self::Float32 => {
                let value = f32::from_ne_bytes(bytes.try_into().unwrap());
                FV::Float(float_to_metadata(
                    f64::from(value),
                    value.is_nan(),
                    value.to_bits() == ZARR_NAN_F32.to_bits(),
                    &value.to_be_bytes(),
                ))
            }
            Self::Float64 => {
                let value = f64::from_ne_bytes(bytes.try_into().unwrap());
                FV::Float(float_to_metadata(
                    value,
                    value.is_nan(),
                    value.to_bits() == ZARR_NAN_F64.to_bits(),
                    &value.to_be_bytes(),
                ))
            }
            Self::Complex64 => {
                let re = f32::from_ne_bytes(bytes[0..4].try_into().unwrap());
                let im = f32::from_ne_bytes(bytes[4..8].try_into().unwrap());
                FV::Complex(
                    float_to_metadata(
                        f64::from(re),
                        re.is_nan(),
                        re.to_bits() == ZARR_NAN_F32.to_bits(),
                        &re.to_be_bytes(),
                    ),
                    float_to_metadata(
                        f64::from(im),
                        im.is_nan(),
                        im.to_bits() == ZARR_NAN_F32.to_bits(),
                        &im.to_be_bytes(),
                    ),
                )
            }
            Self::Complex128 => {
                let re = f64::from_ne_bytes(bytes[0..8].try_into().unwrap());
                let im = f64::from_ne_bytes(bytes[8..16].try_into().unwrap());
                FV::Complex(
                    float_to_metadata(
                        re,
                        re.is_nan(),
                        re.to_bits() == ZARR_NAN_F64.to_bits(),
                        &re.to_be_bytes(),
                    ),
                    float_to_metadata(
                        im,
                        im.is_nan(),
                        im.to_bits() == ZARR_NAN_F64.to_bits(),
                        &im.to_be_bytes(),
                    ),
                )
            }
            Self::RawBits(_) => FV::ByteArray(bytes.to_vec()),
        }
    }

    /// The default (zero) fill value for the data type.
    #[must_use]
    pub fn default_fill_value(&self) -> FillValue {
        FillValue::new(vec![0; self.size()])
    }
}

fn int_fill_value<T: TryFrom<i64> + TryFrom<u64>>(fill_value: &FillValueMetadata) -> Option<T> {
    match fill_value {
        FillValueMetadata::Int(value) => T::try_from(*value).ok(),
        FillValueMetadata::UInt(value) => T::try_from(*value).ok(),
        _ => None,
    }
}

fn uint_fill_value<T: TryFrom<u64>>(fill_value: &FillValueMetadata) -> Option<T> {
    match fill_value {
        FillValueMetadata::UInt(value) => T::try_from(*value).ok(),
        FillValueMetadata::Int(value) => u64::try_from(*value).ok().and_then(|v| T::try_from(v).ok()),
        _ => None,
    }
}

fn complex_components(
    fill_value: &FillValueMetadata,
) -> Option<(FillValueFloat, FillValueFloat)> {
    match fill_value {
        FillValueMetadata::Complex(re, im) => Some((re.clone(), im.clone())),
        // A pair of small integers parses as a byte array.
        FillValueMetadata::ByteArray(bytes) if bytes.len() == 2 => Some((
            FillValueFloat::Float(f64::from(bytes[0])),
            FillValueFloat::Float(f64::from(bytes[1])),
        )),
        _ => None,
    }
}

fn float_to_metadata(value: f64, is_nan: bool, is_zarr_nan: bool, be_bytes: &[u8]) -> FillValueFloat {
    use FillValueFloatStringNonFinite as NF;
    if is_nan {
        if is_zarr_nan {
            FillValueFloat::NonFinite(NF::NaN)
        } else {
            FillValueFloat::HexString(be_bytes.to_vec().into())
        }
    } else if value == f64::INFINITY {
        FillValueFloat::NonFinite(NF::PosInfinity)
    } else if value == f64::NEG_INFINITY {
        FillValueFloat::NonFinite(NF::NegInfinity)
    } else {
        FillValueFloat::Float(value)
    }
}

fn f64_from_float(float: &FillValueFloat) -> Option<f64> {
    use FillValueFloatStringNonFinite as NF;
    match float {
        FillValueFloat::NonFinite(NF::NaN) => Some(ZARR_NAN_F64),
        FillValueFloat::HexString(hex) if hex.as_be_bytes().len() == 8 => {
            Some(f64::from_be_bytes(hex.as_be_bytes().try_into().ok()?))
        }
        _ => float.to_f64(),
    }
}

fn f32_from_float(float: &FillValueFloat) -> Option<f32> {
    use FillValueFloatStringNonFinite as NF;
    match float {
        FillValueFloat::NonFinite(NF::NaN) => Some(ZARR_NAN_F32),
        FillValueFloat::HexString(hex) if hex.as_be_bytes().len() == 4 => {
            Some(f32::from_be_bytes(hex.as_be_bytes().try_into().ok()?))
        }
        #[allow(clippy::cast_possible_truncation)]
        _ => float.to_f64().map(|value| value as f32),
    }
}

fn f16_from_float(float: &FillValueFloat) -> Option<f16> {
    use FillValueFloatStringNonFinite as NF;
    match float {
        FillValueFloat::NonFinite(NF::NaN) => Some(ZARR_NAN_F16),
        FillValueFloat::HexString(hex) if hex.as_be_bytes().len() == 2 => {
            Some(f16::from_be_bytes(hex.as_be_bytes().try_into().ok()?))
        }
        _ => float.to_f64().map(f16::from_f64),
    }
}

fn bf16_from_float(float: &FillValueFloat) -> Option<bf16> {
    use FillValueFloatStringNonFinite as NF;
    match float {
        FillValueFloat::NonFinite(NF::NaN) => Some(ZARR_NAN_BF16),
        FillValueFloat::HexString(hex) if hex.as_be_bytes().len() == 2 => {
            Some(bf16::from_be_bytes(hex.as_be_bytes().try_into().ok()?))
        }
        _ => float.to_f64().map(bf16::from_f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_names() {
        assert_eq!(DataType::Float64.identifier(), "float64");
        assert_eq!(DataType::RawBits(2).identifier(), "r16");
        assert_eq!(
            DataType::from_metadata(&Metadata::new("uint16")).unwrap(),
            DataType::UInt16
        );
        assert_eq!(
            DataType::from_metadata(&Metadata::new("r16")).unwrap(),
            DataType::RawBits(2)
        );
        assert!(DataType::from_metadata(&Metadata::new("r7")).is_err());
        assert!(DataType::from_metadata(&Metadata::new("datetime64")).is_err());
    }

    #[test]
    fn data_type_sizes() {
        assert_eq!(DataType::Bool.size(), 1);
        assert_eq!(DataType::Int64.size(), 8);
        assert_eq!(DataType::Float16.size(), 2);
        assert_eq!(DataType::Complex128.size(), 16);
        assert_eq!(DataType::RawBits(3).size(), 3);
    }

    #[test]
    fn fill_value_int_range() {
        let fill_value = DataType::Int8
            .fill_value_from_metadata(&FillValueMetadata::Int(-5))
            .unwrap();
        assert_eq!(fill_value.as_ne_bytes(), (-5i8).to_ne_bytes());
        assert!(DataType::Int8
            .fill_value_from_metadata(&FillValueMetadata::Int(200))
            .is_err());
        assert!(DataType::UInt8
            .fill_value_from_metadata(&FillValueMetadata::Int(-1))
            .is_err());
    }

    #[test]
    fn fill_value_float_nan_roundtrip() {
        let nan: FillValueMetadata = serde_json::from_str(r#""NaN""#).unwrap();
        let fill_value = DataType::Float64.fill_value_from_metadata(&nan).unwrap();
        assert_eq!(fill_value.as_ne_bytes(), ZARR_NAN_F64.to_ne_bytes());
        let metadata = DataType::Float64.metadata_fill_value(&fill_value);
        assert_eq!(serde_json::to_string(&metadata).unwrap(), r#""NaN""#);
    }

    #[test]
    fn fill_value_float_from_int() {
        let fill_value = DataType::Float32
            .fill_value_from_metadata(&FillValueMetadata::UInt(0))
            .unwrap();
        assert_eq!(fill_value.as_ne_bytes(), 0.0f32.to_ne_bytes());
    }

    #[test]
    fn fill_value_hex_string() {
        let hex: FillValueMetadata = serde_json::from_str(r#""0x7fc00001""#).unwrap();
        let fill_value = DataType::Float32.fill_value_from_metadata(&hex).unwrap();
        let value = f32::from_ne_bytes(fill_value.as_ne_bytes().try_into().unwrap());
        assert!(value.is_nan());
        // A NaN with a non-standard payload round-trips through a hex string.
        let metadata = DataType::Float32.metadata_fill_value(&fill_value);
        assert_eq!(
            serde_json::to_string(&metadata).unwrap(),
            r#""0x7fc00001""#
        );
    }

    #[test]
    fn fill_value_complex() {
        let metadata: FillValueMetadata = serde_json::from_str("[1.5, -2.5]").unwrap();
        let fill_value = DataType::Complex64.fill_value_from_metadata(&metadata).unwrap();
        assert_eq!(fill_value.size(), 8);
        let re = f32::from_ne_bytes(fill_value.as_ne_bytes()[0..4].try_into().unwrap());
        let im = f32::from_ne_bytes(fill_value.as_ne_bytes()[4..8].try_into().unwrap());
        assert_eq!((re, im), (1.5, -2.5));
    }

    #[test]
    fn fill_value_raw_bits() {
        let metadata: FillValueMetadata = serde_json::from_str("[1, 2, 3]").unwrap();
        let fill_value = DataType::RawBits(3).fill_value_from_metadata(&metadata).unwrap();
        assert_eq!(fill_value.as_ne_bytes(), &[1, 2, 3]);
        assert!(DataType::RawBits(2)
            .fill_value_from_metadata(&metadata)
            .is_err());
    }
}
