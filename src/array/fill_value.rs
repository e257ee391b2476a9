//! Fill values.
//!
//! A [`FillValue`] holds the native-endian byte representation of a single
//! element: the value every logical cell holds absent an explicit write, and
//! the implicit content of missing chunks.

/// The byte representation written for an `f16` NaN fill value.
pub const ZARR_NAN_F16: half::f16 = half::f16::from_bits(0x7e00);

/// The byte representation written for a `bf16` NaN fill value.
pub const ZARR_NAN_BF16: half::bf16 = half::bf16::from_bits(0x7fc0);

/// The byte representation written for an `f32` NaN fill value.
pub const ZARR_NAN_F32: f32 = f32::from_bits(0x7fc0_0000);

/// The byte representation written for an `f64` NaN fill value.
pub const ZARR_NAN_F64: f64 = f64::from_bits(0x7ff8_0000_0000_0000);

/// The fill value of an array.
///
/// Stores the native-endian bytes of one element of the array data type.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<&[u8]> for FillValue {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        Self(vec![u8::from(value)])
    }
}

macro_rules! impl_fill_value_from_ne_bytes {
    ($($type:ty),*) => {
        $(
            impl From<$type> for FillValue {
                fn from(value: $type) -> Self {
                    Self(value.to_ne_bytes().to_vec())
                }
            }
        )*
    };
}

impl_fill_value_from_ne_bytes!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64, half::f16, half::bf16);

impl From<num_complex::Complex32> for FillValue {
    fn from(value: num_complex::Complex32) -> Self {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend(value.re.to_ne_bytes());
        bytes.extend(value.im.to_ne_bytes());
        Self(bytes)
    }
}

impl From<num_complex::Complex64> for FillValue {
    fn from(value: num_complex::Complex64) -> Self {
        let mut bytes = Vec::with_capacity(16);
        bytes.extend(value.re.to_ne_bytes());
        bytes.extend(value.im.to_ne_bytes());
        Self(bytes)
    }
}

impl FillValue {
    /// Create a new fill value from its native-endian bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Return the native-endian bytes of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The element size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return a buffer of `num_elements` copies of the fill value.
    #[must_use]
    pub fn all_elements(&self, num_elements: usize) -> Vec<u8> {
        self.0.repeat(num_elements)
    }

    /// Returns true if every element of `bytes` equals the fill value.
    ///
    /// Returns false if `bytes` is not a whole number of elements.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        if self.0.is_empty() || bytes.len() % self.0.len() != 0 {
            return false;
        }
        bytes
            .chunks_exact(self.0.len())
            .all(|element| element == self.0)
    }
}
