use std::num::NonZeroU64;

use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::ArrayShape;

/// The shape of a chunk: all dimensions are non-zero.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug, Deref, From)]
pub struct ChunkShape(Vec<NonZeroU64>);

/// A zero value was supplied for a chunk dimension.
#[derive(Copy, Clone, Debug, Error)]
#[error("chunk shape dimensions must be non-zero")]
pub struct NonZeroError;

impl ChunkShape {
    /// Convert to an [`ArrayShape`].
    #[must_use]
    pub fn to_array_shape(&self) -> ArrayShape {
        self.0.iter().map(|dimension| dimension.get()).collect()
    }

    /// The number of elements of a chunk.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.0.iter().map(|dimension| dimension.get()).product()
    }

    /// The dimensionality of a chunk.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.0.len()
    }
}

impl TryFrom<Vec<u64>> for ChunkShape {
    type Error = NonZeroError;

    fn try_from(shape: Vec<u64>) -> Result<Self, Self::Error> {
        shape
            .into_iter()
            .map(|dimension| NonZeroU64::new(dimension).ok_or(NonZeroError))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl TryFrom<&[u64]> for ChunkShape {
    type Error = NonZeroError;

    fn try_from(shape: &[u64]) -> Result<Self, Self::Error> {
        shape.to_vec().try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_shape_try_from() {
        let shape = ChunkShape::try_from(vec![2, 3]).unwrap();
        assert_eq!(shape.to_array_shape(), vec![2, 3]);
        assert_eq!(shape.num_elements(), 6);
        assert!(ChunkShape::try_from(vec![2, 0]).is_err());
    }
}
