//! The chunk indexer.
//!
//! Given an array shape, a chunk shape, and a [selection](ArraySelection),
//! the [`Indexer`] lazily enumerates the [`ChunkProjection`] of every chunk
//! the selection overlaps: the chunk's grid coordinates, the selected region
//! in chunk-local coordinates, and the corresponding region of the dense
//! output buffer.
//!
//! Projections are yielded in row-major order over the chunk coordinates,
//! a stable contract relied upon by sharded chunk encoding.
//!
//! The projections of a selection partition it: each selected element maps
//! onto exactly one `(chunk, chunk-local index)` pair and exactly one output
//! index, with no overlaps between chunks.

use itertools::izip;

use crate::{
    metadata::ArrayIndices,
    selection::{ArraySelection, AxisRange, IncompatibleDimensionalityError},
};

/// The projection of a selection onto a single chunk.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ChunkProjection {
    /// The grid coordinates of the chunk.
    pub chunk_indices: ArrayIndices,
    /// The selected region in chunk-local coordinates.
    pub chunk_selection: ArraySelection,
    /// The corresponding region of the dense output buffer.
    pub out_selection: ArraySelection,
}

/// The projection of a selection onto the chunks of a single axis.
#[derive(Clone, Debug)]
struct AxisProjection {
    chunk_index: u64,
    chunk_range: AxisRange,
    out_range: AxisRange,
}

/// Project the selection range of one axis onto the chunks of that axis.
fn project_axis(range: &AxisRange, chunk_size: u64) -> Vec<AxisProjection> {
    let (start, stop, step) = (range.start(), range.stop(), range.step());
    if start == stop {
        return Vec::new();
    }

    let first_chunk = start / chunk_size;
    let last_chunk = (stop - 1) / chunk_size;

    let mut projections = Vec::with_capacity(usize::try_from(last_chunk - first_chunk + 1).unwrap_or_default());
    for chunk_index in first_chunk..=last_chunk {
        let chunk_start = chunk_index * chunk_size;
        let chunk_stop = ((chunk_index + 1) * chunk_size).min(stop);

        // The first selected index at or after the chunk origin, congruent to
        // the selection start modulo the step.
        let first = if start >= chunk_start {
            start
        } else {
            let offset = chunk_start - start;
            start + offset.div_ceil(step) * step
        };
        if first >= chunk_stop {
            continue;
        }

        let chunk_range =
            unsafe { AxisRange::new_unchecked(first - chunk_start, chunk_stop - chunk_start, step) };
        let out_start = (first - start) / step;
        let out_range =
            unsafe { AxisRange::new_unchecked(out_start, out_start + chunk_range.len(), 1) };
        projections.push(AxisProjection {
            chunk_index,
            chunk_range,
            out_range,
        });
    }
    projections
}

/// A lazy iterator over the [`ChunkProjection`] of every chunk a selection overlaps.
#[derive(Clone, Debug)]
pub struct Indexer {
    axes: Vec<Vec<AxisProjection>>,
    /// Odometer state: the next projection, or [`None`] when exhausted.
    next: Option<Vec<usize>>,
}

impl Indexer {
    /// Create an indexer for `selection` over an array with `chunk_shape` chunks.
    ///
    /// # Errors
    ///
    /// Returns an [`IncompatibleDimensionalityError`] if the dimensionality of
    /// `chunk_shape` does not match the selection.
    pub fn new(
        selection: &ArraySelection,
        chunk_shape: &[u64],
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if selection.dimensionality() != chunk_shape.len() {
            return Err(IncompatibleDimensionalityError::new(
                chunk_shape.len(),
                selection.dimensionality(),
            ));
        }
        let axes: Vec<Vec<AxisProjection>> = izip!(selection.ranges(), chunk_shape)
            .map(|(range, &chunk_size)| project_axis(range, chunk_size))
            .collect();
        let next = if axes.iter().all(|axis| !axis.is_empty()) {
            Some(vec![0; axes.len()])
        } else {
            None
        };
        Ok(Self { axes, next })
    }

    /// The number of chunks the selection overlaps.
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.axes.iter().map(Vec::len).product()
    }
}

impl Iterator for Indexer {
    type Item = ChunkProjection;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.next.as_mut()?;

        let mut chunk_indices = Vec::with_capacity(self.axes.len());
        let mut chunk_ranges = Vec::with_capacity(self.axes.len());
        let mut out_ranges = Vec::with_capacity(self.axes.len());
        for (axis, &index) in izip!(&self.axes, indices.iter()) {
            let projection = &axis[index];
            chunk_indices.push(projection.chunk_index);
            chunk_ranges.push(projection.chunk_range);
            out_ranges.push(projection.out_range);
        }
        let item = ChunkProjection {
            chunk_indices,
            chunk_selection: ArraySelection::new(chunk_ranges),
            out_selection: ArraySelection::new(out_ranges),
        };

        // Advance row-major: the last axis varies fastest.
        let mut exhausted = true;
        for axis in (0..self.axes.len()).rev() {
            indices[axis] += 1;
            if indices[axis] < self.axes[axis].len() {
                exhausted = false;
                break;
            }
            indices[axis] = 0;
        }
        if exhausted {
            self.next = None;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // An upper bound; iteration may already be partially advanced.
        (0, Some(self.num_chunks()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SliceSpec;

    fn indexer(selection: &ArraySelection, chunk_shape: &[u64]) -> Vec<ChunkProjection> {
        Indexer::new(selection, chunk_shape).unwrap().collect()
    }

    #[test]
    fn single_axis_unstrided() {
        // Selection [2, 8) over chunks of 3: chunks 0, 1, 2.
        let projections = indexer(&ArraySelection::new_with_ranges(&[2..8]), &[3]);
        assert_eq!(projections.len(), 3);
        assert_eq!(projections[0].chunk_indices, vec![0]);
        assert_eq!(
            projections[0].chunk_selection,
            ArraySelection::new_with_ranges(&[2..3])
        );
        assert_eq!(
            projections[0].out_selection,
            ArraySelection::new_with_ranges(&[0..1])
        );
        assert_eq!(projections[1].chunk_indices, vec![1]);
        assert_eq!(
            projections[1].chunk_selection,
            ArraySelection::new_with_ranges(&[0..3])
        );
        assert_eq!(
            projections[1].out_selection,
            ArraySelection::new_with_ranges(&[1..4])
        );
        assert_eq!(projections[2].chunk_indices, vec![2]);
        assert_eq!(
            projections[2].chunk_selection,
            ArraySelection::new_with_ranges(&[0..2])
        );
        assert_eq!(
            projections[2].out_selection,
            ArraySelection::new_with_ranges(&[4..6])
        );
    }

    #[test]
    fn single_axis_strided() {
        // Selection 2:8:2 over chunks of 3 in a length 10 array.
        let selection =
            ArraySelection::normalise(&[SliceSpec::new(Some(2), Some(8), 2)], &[10]).unwrap();
        let projections = indexer(&selection, &[3]);
        // Selected indices 2, 4, 6: chunk 0 holds 2, chunk 1 holds 4, chunk 2 holds 6.
        assert_eq!(projections.len(), 3);
        assert_eq!(projections[0].chunk_selection.ranges()[0].start(), 2);
        assert_eq!(projections[1].chunk_selection.ranges()[0].start(), 1);
        assert_eq!(projections[2].chunk_selection.ranges()[0].start(), 0);
        for (i, projection) in projections.iter().enumerate() {
            assert_eq!(projection.chunk_selection.num_elements(), 1);
            assert_eq!(
                projection.out_selection,
                ArraySelection::new_with_ranges(&[i as u64..i as u64 + 1])
            );
        }
    }

    #[test]
    fn step_larger_than_chunk() {
        // Selection 0:10:4 over chunks of 2: indices 0, 4, 8 in chunks 0, 2, 4.
        let selection =
            ArraySelection::normalise(&[SliceSpec::new(None, None, 4)], &[10]).unwrap();
        let projections = indexer(&selection, &[2]);
        assert_eq!(projections.len(), 3);
        assert_eq!(projections[0].chunk_indices, vec![0]);
        assert_eq!(projections[1].chunk_indices, vec![2]);
        assert_eq!(projections[2].chunk_indices, vec![4]);
    }

    #[test]
    fn multi_axis_row_major_order() {
        let projections = indexer(&ArraySelection::new_with_ranges(&[0..4, 0..4]), &[2, 2]);
        let coords: Vec<_> = projections
            .iter()
            .map(|projection| projection.chunk_indices.clone())
            .collect();
        assert_eq!(
            coords,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
    }

    #[test]
    fn empty_selection() {
        let projections = indexer(&ArraySelection::new_with_ranges(&[2..2]), &[3]);
        assert!(projections.is_empty());
    }

    #[test]
    fn projections_partition_selection() {
        // Property: the union of out selections tiles the output exactly once.
        let selection = ArraySelection::normalise(
            &[
                SliceSpec::new(Some(1), Some(9), 3),
                SliceSpec::new(Some(0), Some(7), 2),
            ],
            &[10, 8],
        )
        .unwrap();
        let out_shape = selection.shape();
        let num_out = selection.num_elements_usize();
        let mut covered = vec![0u32; num_out];
        for projection in Indexer::new(&selection, &[4, 3]).unwrap() {
            assert_eq!(
                projection.chunk_selection.num_elements(),
                projection.out_selection.num_elements()
            );
            projection
                .out_selection
                .for_each_contiguous_run(&out_shape, |offset, length| {
                    for i in offset..offset + length {
                        covered[usize::try_from(i).unwrap()] += 1;
                    }
                });
        }
        assert!(covered.iter().all(|&count| count == 1));
    }
}
