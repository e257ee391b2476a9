use super::DataType;

/// An element type with a fixed byte representation matching a [`DataType`].
///
/// Bridges typed slices and the dense native-endian byte buffers the array
/// engine operates on.
/// `bool` arrays are accessed as [`u8`] elements holding 0 or 1.
pub trait Element: bytemuck::Pod + Send + Sync {
    /// Returns true if the element type is compatible with `data_type`.
    fn is_compatible(data_type: &DataType) -> bool;

    /// Convert a byte buffer into a vector of elements.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not a whole number of elements.
    #[must_use]
    fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        assert_eq!(bytes.len() % core::mem::size_of::<Self>(), 0);
        let mut elements = vec![Self::zeroed(); bytes.len() / core::mem::size_of::<Self>()];
        bytemuck::cast_slice_mut(&mut elements).copy_from_slice(bytes);
        elements
    }

    /// Convert a slice of elements into a byte buffer.
    #[must_use]
    fn to_bytes(elements: &[Self]) -> Vec<u8> {
        bytemuck::cast_slice(elements).to_vec()
    }
}

macro_rules! impl_element {
    ($type:ty, $($data_type:pat_param)|+) => {
        impl Element for $type {
            fn is_compatible(data_type: &DataType) -> bool {
                matches!(data_type, $($data_type)|+)
            }
        }
    };
}

impl_element!(u8, DataType::UInt8 | DataType::Bool | DataType::RawBits(1));
impl_element!(u16, DataType::UInt16);
impl_element!(u32, DataType::UInt32);
impl_element!(u64, DataType::UInt64);
impl_element!(i8, DataType::Int8);
impl_element!(i16, DataType::Int16);
impl_element!(i32, DataType::Int32);
impl_element!(i64, DataType::Int64);
impl_element!(half::f16, DataType::Float16);
impl_element!(half::bf16, DataType::BFloat16);
impl_element!(f32, DataType::Float32);
impl_element!(f64, DataType::Float64);
impl_element!(num_complex::Complex32, DataType::Complex64);
impl_element!(num_complex::Complex64, DataType::Complex128);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_compatibility() {
        assert!(u8::is_compatible(&DataType::UInt8));
        assert!(u8::is_compatible(&DataType::Bool));
        assert!(!u16::is_compatible(&DataType::Int16));
        assert!(f64::is_compatible(&DataType::Float64));
    }

    #[test]
    fn element_conversions() {
        let elements: Vec<u32> = vec![1, 2, 3];
        let bytes = u32::to_bytes(&elements);
        assert_eq!(bytes.len(), 12);
        assert_eq!(u32::from_bytes(&bytes), elements);
    }
}
