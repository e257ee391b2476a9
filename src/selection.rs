//! Array selections.
//!
//! An [`ArraySelection`] is a rank-dimensional rectangular, possibly strided,
//! index region into an array: one normalised `(start, stop, step)` range per
//! axis.
//! Selections are built from [`SliceSpec`] values, which permit omitted
//! bounds and negative (from-the-end) indices, via
//! [`ArraySelection::normalise`].
//!
//! This module also provides the copy primitives used by the array engine to
//! move a selection between a dense row-major buffer and a selection-shaped
//! dense buffer.

use itertools::izip;
use thiserror::Error;

use crate::{
    byte_range::ByteRange,
    metadata::{ArrayIndices, ArrayShape},
};

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// An invalid selection error.
#[derive(Clone, Debug, Error)]
pub enum InvalidSelectionError {
    /// The selection has more axes than the array.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A step is zero or negative.
    #[error("unsupported step {0}, steps must be >= 1")]
    UnsupportedStep(i64),
    /// An index does not fall within the array shape.
    #[error("index {0} is out of bounds on axis {1} with length {2}")]
    OutOfBounds(i64, usize, u64),
}

/// A normalised range over one axis: `start`, exclusive `stop`, and `step`.
///
/// Invariants: `step >= 1` and `stop >= start`.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct AxisRange {
    start: u64,
    stop: u64,
    step: u64,
}

impl AxisRange {
    /// Create a new axis range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSelectionError::UnsupportedStep`] if `step` is zero.
    /// `stop` is clamped up to `start`.
    pub fn new(start: u64, stop: u64, step: u64) -> Result<Self, InvalidSelectionError> {
        if step == 0 {
            return Err(InvalidSelectionError::UnsupportedStep(0));
        }
        Ok(Self {
            start,
            stop: stop.max(start),
            step,
        })
    }

    /// Create a new axis range without validation.
    ///
    /// # Safety
    ///
    /// `step` must be non-zero and `stop >= start`.
    #[must_use]
    pub unsafe fn new_unchecked(start: u64, stop: u64, step: u64) -> Self {
        debug_assert!(step >= 1 && stop >= start);
        Self { start, stop, step }
    }

    /// The start of the range.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// The exclusive stop of the range.
    #[must_use]
    pub const fn stop(&self) -> u64 {
        self.stop
    }

    /// The step of the range.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// The number of selected indices.
    #[must_use]
    pub const fn len(&self) -> u64 {
        (self.stop - self.start).div_ceil(self.step)
    }

    /// Returns true if the range selects no indices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Returns an iterator over the selected indices.
    pub fn indices(&self) -> impl Iterator<Item = u64> {
        (self.start..self.stop).step_by(usize::try_from(self.step).unwrap_or(usize::MAX))
    }
}

impl From<std::ops::Range<u64>> for AxisRange {
    fn from(range: std::ops::Range<u64>) -> Self {
        Self {
            start: range.start,
            stop: range.end.max(range.start),
            step: 1,
        }
    }
}

/// A per-axis slice specification before normalisation.
///
/// `start` and `stop` may be omitted (the full extent) or negative (counted
/// from the end of the axis); `step` must normalise to a positive value.
#[derive(Clone, Copy, Debug)]
pub struct SliceSpec {
    /// The start index, or [`None`] for the start of the axis.
    pub start: Option<i64>,
    /// The exclusive stop index, or [`None`] for the end of the axis.
    pub stop: Option<i64>,
    /// The step. Must be positive.
    pub step: i64,
}

impl SliceSpec {
    /// The full extent of an axis.
    pub const FULL: Self = Self {
        start: None,
        stop: None,
        step: 1,
    };

    /// Create a new slice specification.
    #[must_use]
    pub const fn new(start: Option<i64>, stop: Option<i64>, step: i64) -> Self {
        Self { start, stop, step }
    }
}

impl Default for SliceSpec {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<std::ops::Range<i64>> for SliceSpec {
    fn from(range: std::ops::Range<i64>) -> Self {
        Self {
            start: Some(range.start),
            stop: Some(range.end),
            step: 1,
        }
    }
}

/// A rank-dimensional rectangular, possibly strided, selection.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ArraySelection {
    ranges: Vec<AxisRange>,
}

impl std::fmt::Display for ArraySelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}:{}", range.start, range.stop, range.step)?;
        }
        write!(f, "]")
    }
}

impl ArraySelection {
    /// Create a selection from per-axis ranges.
    #[must_use]
    pub fn new(ranges: Vec<AxisRange>) -> Self {
        Self { ranges }
    }

    /// Create a selection covering all of `shape`.
    #[must_use]
    pub fn full(shape: &[u64]) -> Self {
        Self {
            ranges: shape
                .iter()
                .map(|&size| AxisRange::from(0..size))
                .collect(),
        }
    }

    /// Create a step-one selection from per-axis index ranges.
    #[must_use]
    pub fn new_with_ranges(ranges: &[std::ops::Range<u64>]) -> Self {
        Self {
            ranges: ranges.iter().map(|range| range.clone().into()).collect(),
        }
    }

    /// Normalise `specs` against `shape` into a selection.
    ///
    /// Omitted axes select their full extent, omitted bounds default to the
    /// axis extent, and negative indices count from the end of the axis.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidSelectionError`] if `specs` has more axes than
    /// `shape`, a step is not positive, or an index is out of bounds.
    pub fn normalise(specs: &[SliceSpec], shape: &[u64]) -> Result<Self, InvalidSelectionError> {
        if specs.len() > shape.len() {
            return Err(IncompatibleDimensionalityError(specs.len(), shape.len()).into());
        }

        let normalise_index = |index: i64, axis: usize, size: u64| -> Result<u64, InvalidSelectionError> {
            let normalised = if index < 0 {
                i64::try_from(size)
                    .map_err(|_| InvalidSelectionError::OutOfBounds(index, axis, size))?
                    + index
            } else {
                index
            };
            if normalised < 0 {
                return Err(InvalidSelectionError::OutOfBounds(index, axis, size));
            }
            let normalised = normalised.unsigned_abs();
            if normalised > size {
                return Err(InvalidSelectionError::OutOfBounds(index, axis, size));
            }
            Ok(normalised)
        };

        let mut ranges = Vec::with_capacity(shape.len());
        for (axis, &size) in shape.iter().enumerate() {
            let spec = specs.get(axis).copied().unwrap_or_default();
            if spec.step < 1 {
                return Err(InvalidSelectionError::UnsupportedStep(spec.step));
            }
            let start = spec.start.map_or(Ok(0), |start| normalise_index(start, axis, size))?;
            let stop = spec.stop.map_or(Ok(size), |stop| normalise_index(stop, axis, size))?;
            ranges.push(AxisRange {
                start,
                stop: stop.max(start),
                step: spec.step.unsigned_abs(),
            });
        }
        Ok(Self { ranges })
    }

    /// The per-axis ranges of the selection.
    #[must_use]
    pub fn ranges(&self) -> &[AxisRange] {
        &self.ranges
    }

    /// The dimensionality of the selection.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.ranges.len()
    }

    /// The shape of the selection: the per-axis number of selected indices.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.ranges.iter().map(AxisRange::len).collect()
    }

    /// The number of selected elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.ranges.iter().map(AxisRange::len).product()
    }

    /// The number of selected elements as a [`usize`].
    ///
    /// # Panics
    ///
    /// Panics if [`num_elements`](Self::num_elements) exceeds [`usize::MAX`].
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        usize::try_from(self.num_elements()).unwrap()
    }

    /// Returns true if the selection is within the bounds of `array_shape`.
    #[must_use]
    pub fn is_within(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(&self.ranges, array_shape).all(|(range, &size)| range.stop <= size)
    }

    /// Returns true if the selection selects the whole of `array_shape`
    /// contiguously (step one on every axis).
    #[must_use]
    pub fn covers_exactly(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(&self.ranges, array_shape).all(|(range, &size)| {
                range.start == 0 && range.stop == size && range.step == 1
            })
    }

    /// Call `f` with `(linearised element offset, element count)` for each
    /// maximal contiguous run of selected elements, in row-major selection
    /// order, within an array of shape `array_shape`.
    pub(crate) fn for_each_contiguous_run(
        &self,
        array_shape: &[u64],
        mut f: impl FnMut(u64, u64),
    ) {
        debug_assert_eq!(self.dimensionality(), array_shape.len());
        if self.num_elements() == 0 {
            return;
        }

        // Row-major strides in elements.
        let mut strides = vec![1_u64; array_shape.len()];
        for axis in (0..array_shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * array_shape[axis + 1];
        }

        let inner_axis = self.ranges.len() - 1;
        let inner = &self.ranges[inner_axis];
        let inner_contiguous = inner.step == 1;

        // Odometer over the outer axes.
        let mut indices: ArrayIndices = self.ranges[..inner_axis]
            .iter()
            .map(AxisRange::start)
            .collect();
        loop {
            let outer_offset: u64 = izip!(&indices, &strides[..inner_axis])
                .map(|(index, stride)| index * stride)
                .sum();
            if inner_contiguous {
                f(outer_offset + inner.start, inner.len());
            } else {
                for index in inner.indices() {
                    f(outer_offset + index, 1);
                }
            }

            // Advance the odometer, innermost outer axis fastest.
            let mut axis = inner_axis;
            loop {
                if axis == 0 {
                    return;
                }
                axis -= 1;
                indices[axis] += self.ranges[axis].step;
                if indices[axis] < self.ranges[axis].stop {
                    break;
                }
                indices[axis] = self.ranges[axis].start;
            }
        }
    }

    /// Return the byte ranges of the selection within a dense row-major array
    /// of shape `array_shape` with elements of `element_size` bytes, in
    /// row-major selection order.
    #[must_use]
    pub fn byte_ranges(&self, array_shape: &[u64], element_size: usize) -> Vec<ByteRange> {
        let element_size = element_size as u64;
        let mut byte_ranges = Vec::new();
        self.for_each_contiguous_run(array_shape, |offset, length| {
            byte_ranges.push(ByteRange::Interval(
                offset * element_size,
                length * element_size,
            ));
        });
        byte_ranges
    }

    /// Extract the bytes of this selection from a dense row-major array of
    /// shape `array_shape` with elements of `element_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an [`IncompatibleDimensionalityError`] if the selection does
    /// not lie within `array_shape` or `src` has the wrong length.
    ///
    /// # Panics
    ///
    /// Panics if a byte offset exceeds [`usize::MAX`].
    pub fn extract_from(
        &self,
        src: &[u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<Vec<u8>, IncompatibleDimensionalityError> {
        if !self.is_within(array_shape)
            || src.len() as u64 != array_shape.iter().product::<u64>() * element_size as u64
        {
            return Err(IncompatibleDimensionalityError(
                self.dimensionality(),
                array_shape.len(),
            ));
        }
        let mut out = Vec::with_capacity(self.num_elements_usize() * element_size);
        self.for_each_contiguous_run(array_shape, |offset, length| {
            let byte_offset = usize::try_from(offset).unwrap() * element_size;
            let byte_length = usize::try_from(length).unwrap() * element_size;
            out.extend_from_slice(&src[byte_offset..byte_offset + byte_length]);
        });
        Ok(out)
    }

    /// Store `src`, a dense buffer of the selection's shape, into this
    /// selection of `dest`, a dense row-major array of shape `array_shape`
    /// with elements of `element_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an [`IncompatibleDimensionalityError`] if the selection does
    /// not lie within `array_shape` or a buffer has the wrong length.
    ///
    /// # Panics
    ///
    /// Panics if a byte offset exceeds [`usize::MAX`].
    pub fn store_into(
        &self,
        src: &[u8],
        dest: &mut [u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<(), IncompatibleDimensionalityError> {
        if !self.is_within(array_shape)
            || dest.len() as u64 != array_shape.iter().product::<u64>() * element_size as u64
            || src.len() != self.num_elements_usize() * element_size
        {
            return Err(IncompatibleDimensionalityError(
                self.dimensionality(),
                array_shape.len(),
            ));
        }
        let mut src_offset = 0;
        self.for_each_contiguous_run(array_shape, |offset, length| {
            let byte_offset = usize::try_from(offset).unwrap() * element_size;
            let byte_length = usize::try_from(length).unwrap() * element_size;
            dest[byte_offset..byte_offset + byte_length]
                .copy_from_slice(&src[src_offset..src_offset + byte_length]);
            src_offset += byte_length;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_full_and_negative() {
        let selection = ArraySelection::normalise(&[], &[4, 5]).unwrap();
        assert_eq!(selection, ArraySelection::full(&[4, 5]));

        let selection = ArraySelection::normalise(
            &[SliceSpec::new(Some(-3), Some(-1), 1)],
            &[10],
        )
        .unwrap();
        assert_eq!(selection.ranges()[0], AxisRange::from(7..9));

        assert!(ArraySelection::normalise(&[SliceSpec::new(Some(0), Some(11), 1)], &[10]).is_err());
        assert!(ArraySelection::normalise(&[SliceSpec::new(None, None, -1)], &[10]).is_err());
        assert!(ArraySelection::normalise(&[SliceSpec::FULL; 2], &[10]).is_err());
    }

    #[test]
    fn selection_shape() {
        let selection = ArraySelection::normalise(
            &[SliceSpec::new(Some(2), Some(8), 2), SliceSpec::FULL],
            &[10, 4],
        )
        .unwrap();
        assert_eq!(selection.shape(), vec![3, 4]);
        assert_eq!(selection.num_elements(), 12);
        assert!(selection.is_within(&[10, 4]));
        assert!(!selection.covers_exactly(&[10, 4]));
        assert!(ArraySelection::full(&[10, 4]).covers_exactly(&[10, 4]));
    }

    #[test]
    fn contiguous_runs_step_one() {
        // 2x2 selection at (1,1) in a 4x4 array.
        let selection = ArraySelection::new_with_ranges(&[1..3, 1..3]);
        let mut runs = Vec::new();
        selection.for_each_contiguous_run(&[4, 4], |offset, length| runs.push((offset, length)));
        assert_eq!(runs, vec![(5, 2), (9, 2)]);
    }

    #[test]
    fn contiguous_runs_strided() {
        // Every other element of a length 10 axis from 2 to 8.
        let selection =
            ArraySelection::new(vec![AxisRange::new(2, 8, 2).unwrap()]);
        let mut runs = Vec::new();
        selection.for_each_contiguous_run(&[10], |offset, length| runs.push((offset, length)));
        assert_eq!(runs, vec![(2, 1), (4, 1), (6, 1)]);
    }

    #[test]
    fn extract_and_store() {
        let src: Vec<u8> = (0..16).collect();
        let selection = ArraySelection::new_with_ranges(&[1..3, 1..3]);
        let block = selection.extract_from(&src, &[4, 4], 1).unwrap();
        assert_eq!(block, vec![5, 6, 9, 10]);

        let mut dest = vec![0u8; 16];
        selection
            .store_into(&block, &mut dest, &[4, 4], 1)
            .unwrap();
        assert_eq!(dest[5], 5);
        assert_eq!(dest[6], 6);
        assert_eq!(dest[9], 9);
        assert_eq!(dest[10], 10);
        assert_eq!(dest.iter().map(|&b| u32::from(b)).sum::<u32>(), 30);
    }

    #[test]
    fn byte_ranges() {
        let selection = ArraySelection::new_with_ranges(&[1..2, 0..3]);
        let ranges = selection.byte_ranges(&[2, 3], 4);
        assert_eq!(ranges, vec![ByteRange::Interval(12, 12)]);
    }
}
