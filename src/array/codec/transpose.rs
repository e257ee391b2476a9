//! The `transpose` array to array codec.
//!
//! Permutes the axes of a chunk.

use std::sync::Arc;

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::{ChunkRepresentation, ChunkShape},
    metadata::Metadata,
    selection::{ArraySelection, AxisRange},
};

use super::{
    ArrayPartialDecoderTraits, ArrayToArrayCodecTraits, CodecCreateError, CodecError, CodecTraits,
};

/// The identifier of the `transpose` codec.
pub const IDENTIFIER: &str = "transpose";

/// An invalid permutation order error.
#[derive(Clone, Debug, Error)]
#[error("permutation order {0:?} is invalid: it must be a permutation of 0..n")]
pub struct InvalidPermutationError(Vec<usize>);

/// A permutation of the axes of a chunk.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[display("{_0:?}")]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct TransposeOrder(Vec<usize>);

impl TransposeOrder {
    /// Create a new permutation order.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPermutationError`] if `order` is not a permutation of `0..order.len()`.
    pub fn new(order: &[usize]) -> Result<Self, InvalidPermutationError> {
        let mut seen = vec![false; order.len()];
        for &axis in order {
            if axis >= order.len() || seen[axis] {
                return Err(InvalidPermutationError(order.to_vec()));
            }
            seen[axis] = true;
        }
        Ok(Self(order.to_vec()))
    }

    /// The permutation.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.0
    }

    /// The inverse permutation.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let mut inverse = vec![0; self.0.len()];
        for (i, &axis) in self.0.iter().enumerate() {
            inverse[axis] = i;
        }
        Self(inverse)
    }
}

impl TryFrom<Vec<usize>> for TransposeOrder {
    type Error = InvalidPermutationError;

    fn try_from(order: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(&order)
    }
}

impl From<TransposeOrder> for Vec<usize> {
    fn from(order: TransposeOrder) -> Self {
        order.0
    }
}

/// Configuration parameters for the `transpose` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct TransposeCodecConfiguration {
    /// The permutation of the axes.
    pub order: TransposeOrder,
}

/// A `transpose` codec implementation.
#[derive(Clone, Debug)]
pub struct TransposeCodec {
    order: TransposeOrder,
}

impl TransposeCodec {
    /// Create a new `transpose` codec.
    #[must_use]
    pub const fn new(order: TransposeOrder) -> Self {
        Self { order }
    }

    /// Create a new `transpose` codec from metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecCreateError`] if the configuration is invalid.
    pub fn new_with_metadata(metadata: &Metadata) -> Result<Self, CodecCreateError> {
        let configuration: TransposeCodecConfiguration = metadata.to_configuration()?;
        Ok(Self::new(configuration.order))
    }
}

/// Permute the axes of a dense row-major byte buffer.
///
/// Axis `j` of the output corresponds to axis `axes[j]` of the input.
fn permute_bytes(
    bytes: &[u8],
    shape: &[u64],
    element_size: usize,
    axes: &[usize],
) -> Result<Vec<u8>, CodecError> {
    // View the buffer as an (shape..., element_size) u8 array so elements
    // travel as units through the permutation.
    let mut dims: Vec<usize> = shape
        .iter()
        .map(|&dimension| usize::try_from(dimension).map_err(|err| CodecError::Other(err.to_string())))
        .collect::<Result<_, _>>()?;
    dims.push(element_size);
    let array = ndarray::ArrayViewD::from_shape(ndarray::IxDyn(&dims), bytes)
        .map_err(|err| CodecError::Other(err.to_string()))?;

    let mut permuted_axes = axes.to_vec();
    permuted_axes.push(shape.len());
    let permuted = array.permuted_axes(ndarray::IxDyn(&permuted_axes));
    Ok(permuted.as_standard_layout().into_owned().into_raw_vec())
}

fn permute_u64(values: &[u64], axes: &[usize]) -> Vec<u64> {
    axes.iter().map(|&axis| values[axis]).collect()
}

impl CodecTraits for TransposeCodec {
    fn create_metadata(&self) -> Metadata {
        let configuration = TransposeCodecConfiguration {
            order: self.order.clone(),
        };
        Metadata::new_with_serializable_configuration(IDENTIFIER, &configuration).unwrap()
    }
}

impl ArrayToArrayCodecTraits for TransposeCodec {
    fn encoded_representation(
        &self,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<ChunkRepresentation, CodecError> {
        if self.order.order().len() != decoded_representation.dimensionality() {
            return Err(CodecError::Other(format!(
                "transpose order {} is incompatible with chunk dimensionality {}",
                self.order,
                decoded_representation.dimensionality()
            )));
        }
        let shape = permute_u64(&decoded_representation.shape_u64(), self.order.order());
        let shape = ChunkShape::try_from(shape)
            .map_err(|err| CodecError::Other(err.to_string()))?;
        Ok(ChunkRepresentation::new(
            shape,
            decoded_representation.data_type().clone(),
            decoded_representation.fill_value().clone(),
        ))
    }

    fn encode(
        &self,
        decoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        permute_bytes(
            &decoded_value,
            &decoded_representation.shape_u64(),
            decoded_representation.element_size(),
            self.order.order(),
        )
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Vec<u8>, CodecError> {
        let encoded_shape =
            permute_u64(&decoded_representation.shape_u64(), self.order.order());
        permute_bytes(
            &encoded_value,
            &encoded_shape,
            decoded_representation.element_size(),
            self.order.inverse().order(),
        )
    }

    fn partial_decoder(
        self: Arc<Self>,
        input_handle: Arc<dyn ArrayPartialDecoderTraits>,
        decoded_representation: &ChunkRepresentation,
    ) -> Result<Arc<dyn ArrayPartialDecoderTraits>, CodecError> {
        Ok(Arc::new(TransposePartialDecoder {
            input_handle,
            decoded_representation: decoded_representation.clone(),
            order: self.order.clone(),
        }))
    }
}

/// Partial decoder for the `transpose` codec.
///
/// Permutes the requested selection into the encoded axis order and
/// un-permutes the decoded block.
struct TransposePartialDecoder {
    input_handle: Arc<dyn ArrayPartialDecoderTraits>,
    decoded_representation: ChunkRepresentation,
    order: TransposeOrder,
}

#[async_trait]
impl ArrayPartialDecoderTraits for TransposePartialDecoder {
    async fn partial_decode(&self, selection: &ArraySelection) -> Result<Vec<u8>, CodecError> {
        let encoded_selection: Vec<AxisRange> = self
            .order
            .order()
            .iter()
            .map(|&axis| selection.ranges()[axis])
            .collect();
        let encoded_selection = ArraySelection::new(encoded_selection);
        let encoded_block = self.input_handle.partial_decode(&encoded_selection).await?;
        permute_bytes(
            &encoded_block,
            &encoded_selection.shape(),
            self.decoded_representation.element_size(),
            self.order.inverse().order(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{DataType, FillValue};

    fn representation() -> ChunkRepresentation {
        ChunkRepresentation::new(
            vec![2, 3].try_into().unwrap(),
            DataType::UInt8,
            FillValue::from(0u8),
        )
    }

    #[test]
    fn transpose_order_validation() {
        assert!(TransposeOrder::new(&[1, 0, 2]).is_ok());
        assert!(TransposeOrder::new(&[1, 1]).is_err());
        assert!(TransposeOrder::new(&[0, 2]).is_err());
        assert_eq!(
            TransposeOrder::new(&[2, 0, 1]).unwrap().inverse().order(),
            &[1, 2, 0]
        );
    }

    #[test]
    fn transpose_roundtrip() {
        let codec = TransposeCodec::new(TransposeOrder::new(&[1, 0]).unwrap());
        // 2x3 row-major.
        let bytes = vec![0, 1, 2, 10, 11, 12];
        let encoded = codec.encode(bytes.clone(), &representation()).unwrap();
        // 3x2 row-major after transpose.
        assert_eq!(encoded, vec![0, 10, 1, 11, 2, 12]);
        let decoded = codec.decode(encoded, &representation()).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn transpose_encoded_representation() {
        let codec = TransposeCodec::new(TransposeOrder::new(&[1, 0]).unwrap());
        let encoded = codec.encoded_representation(&representation()).unwrap();
        assert_eq!(encoded.shape_u64(), vec![3, 2]);
    }

    #[test]
    fn transpose_multibyte_elements() {
        let representation = ChunkRepresentation::new(
            vec![2, 2].try_into().unwrap(),
            DataType::UInt16,
            FillValue::from(0u16),
        );
        let codec = TransposeCodec::new(TransposeOrder::new(&[1, 0]).unwrap());
        let elements: Vec<u16> = vec![1, 2, 3, 4];
        let bytes: Vec<u8> = elements.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let encoded = codec.encode(bytes.clone(), &representation).unwrap();
        let expected: Vec<u8> = [1u16, 3, 2, 4]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        assert_eq!(encoded, expected);
        assert_eq!(codec.decode(encoded, &representation).unwrap(), bytes);
    }
}
