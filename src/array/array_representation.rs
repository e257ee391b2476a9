use super::{ChunkShape, DataType, FillValue};

/// The representation of a decoded chunk: its shape, data type, and fill value.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ChunkRepresentation {
    shape: ChunkShape,
    data_type: DataType,
    fill_value: FillValue,
}

impl ChunkRepresentation {
    /// Create a new chunk representation.
    #[must_use]
    pub fn new(shape: ChunkShape, data_type: DataType, fill_value: FillValue) -> Self {
        debug_assert_eq!(data_type.size(), fill_value.size());
        Self {
            shape,
            data_type,
            fill_value,
        }
    }

    /// The chunk shape.
    #[must_use]
    pub fn shape(&self) -> &ChunkShape {
        &self.shape
    }

    /// The chunk shape as a [`Vec<u64>`](crate::metadata::ArrayShape).
    #[must_use]
    pub fn shape_u64(&self) -> Vec<u64> {
        self.shape.to_array_shape()
    }

    /// The data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// The fill value.
    #[must_use]
    pub const fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// The dimensionality of a chunk.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.dimensionality()
    }

    /// The number of elements of a chunk.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.num_elements()
    }

    /// The element size in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.data_type.size()
    }

    /// The size of a dense chunk in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.num_elements() * self.element_size() as u64
    }
}

/// The representation of encoded chunk bytes: fixed, bounded, or unbounded size.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BytesRepresentation {
    /// The output has a fixed size.
    FixedSize(u64),
    /// The output has a bounded maximum size.
    BoundedSize(u64),
    /// The output size is unbounded.
    UnboundedSize,
}

impl BytesRepresentation {
    /// The fixed or bounded size, if any.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        match self {
            Self::FixedSize(size) | Self::BoundedSize(size) => Some(*size),
            Self::UnboundedSize => None,
        }
    }
}
