//! Row partitioning of a visibility dataset.
//!
//! A [`VisSlicer`] yields [`VisSlice`]s lazily. The slices of one pass
//! partition the dataset's rows exactly and keep per-row order. An empty
//! dataset yields no slices for any key.

use crate::core::error::{FacetError, FacetResult};
use crate::core::visibility::Visibility;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How to group rows into slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceKey {
    /// A single slice holding every row.
    #[default]
    None,
    /// One slice per distinct timestamp, in order of first appearance.
    Time,
    /// `slices` contiguous chunks of near-equal size.
    Rows {
        /// Requested number of chunks.
        slices: usize,
    },
}

impl SliceKey {
    /// Reject keys that can never produce a partition.
    pub fn validate(&self) -> FacetResult<()> {
        match self {
            SliceKey::Rows { slices: 0 } => Err(FacetError::InvalidConfig(
                "row slicing needs at least one slice".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// A set of row indices into a parent dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisSlice {
    /// Slice position in the pass.
    pub index: usize,
    /// Parent row indices, ascending.
    pub rows: Vec<usize>,
}

impl VisSlice {
    /// Number of rows in the slice.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the slice has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy the slice's rows out of `parent` as an independent dataset.
    pub fn materialize(&self, parent: &Visibility) -> FacetResult<Visibility> {
        parent.select_rows(&self.rows)
    }
}

/// Lazy slicer over a borrowed dataset.
#[derive(Debug, Clone)]
pub struct VisSlicer<'a> {
    vis: &'a Visibility,
    key: SliceKey,
    /// Rows per distinct timestamp, in order of first appearance (time key only).
    time_groups: Vec<Vec<usize>>,
}

impl<'a> VisSlicer<'a> {
    /// Create a slicer for `vis`.
    pub fn new(vis: &'a Visibility, key: SliceKey) -> FacetResult<Self> {
        key.validate()?;
        let time_groups = if key == SliceKey::Time {
            group_by_time(&vis.time)
        } else {
            Vec::new()
        };
        Ok(Self {
            vis,
            key,
            time_groups,
        })
    }

    /// Number of slices a pass will yield.
    pub fn slice_count(&self) -> usize {
        let nrows = self.vis.nrows();
        if nrows == 0 {
            return 0;
        }
        match self.key {
            SliceKey::None => 1,
            SliceKey::Time => self.time_groups.len(),
            SliceKey::Rows { slices } => {
                let chunk = self.chunk_size(slices);
                nrows.div_ceil(chunk)
            }
        }
    }

    fn chunk_size(&self, slices: usize) -> usize {
        let nrows = self.vis.nrows();
        nrows.div_ceil(slices).max(1)
    }

    /// Row indices of slice `index`.
    pub fn slice(&self, index: usize) -> Option<VisSlice> {
        if index >= self.slice_count() {
            return None;
        }
        let nrows = self.vis.nrows();
        let rows: Vec<usize> = match self.key {
            SliceKey::None => (0..nrows).collect(),
            SliceKey::Time => self.time_groups[index].clone(),
            SliceKey::Rows { slices } => {
                let chunk = self.chunk_size(slices);
                let start = index * chunk;
                (start..(start + chunk).min(nrows)).collect()
            }
        };
        Some(VisSlice { index, rows })
    }

    /// Iterate over slices. Each call starts a fresh pass.
    pub fn iter(&self) -> VisSliceIter<'_, 'a> {
        VisSliceIter {
            slicer: self,
            next: 0,
        }
    }
}

/// Group row indices by timestamp bit pattern in one pass.
///
/// Signed zeros share a group, as do all NaNs, so every row lands in
/// exactly one group.
fn group_by_time(times: &[f64]) -> Vec<Vec<usize>> {
    let mut groups: IndexMap<u64, Vec<usize>> = IndexMap::new();
    for (row, &t) in times.iter().enumerate() {
        let key = if t.is_nan() {
            f64::NAN.to_bits()
        } else if t == 0.0 {
            0.0f64.to_bits()
        } else {
            t.to_bits()
        };
        groups.entry(key).or_default().push(row);
    }
    groups.into_values().collect()
}

/// Lazy iterator over the slices of a [`VisSlicer`].
#[derive(Debug, Clone)]
pub struct VisSliceIter<'s, 'a> {
    slicer: &'s VisSlicer<'a>,
    next: usize,
}

impl Iterator for VisSliceIter<'_, '_> {
    type Item = VisSlice;

    fn next(&mut self) -> Option<Self::Item> {
        let slice = self.slicer.slice(self.next)?;
        self.next += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.slicer.slice_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for VisSliceIter<'_, '_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::visibility::VisRow;
    use num_complex::Complex64;
    use proptest::prelude::*;

    fn dataset(times: &[f64]) -> Visibility {
        Visibility::from_rows(
            vec![1.0e8],
            times.iter().enumerate().map(|(i, &time)| VisRow {
                uvw: [i as f64, 0.0, 0.0],
                time,
                antenna1: 0,
                antenna2: i % 3 + 1,
                vis: Complex64::new(i as f64, 0.0),
                weight: 1.0,
            }),
        )
    }

    fn assert_partition(slicer: &VisSlicer<'_>, nrows: usize) {
        let mut seen = vec![0u32; nrows];
        for slice in slicer.iter() {
            assert!(slice.rows.windows(2).all(|w| w[0] < w[1]));
            for &row in &slice.rows {
                seen[row] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_no_slicing_yields_whole_dataset() {
        let vis = dataset(&[0.0, 1.0, 2.0]);
        let slicer = VisSlicer::new(&vis, SliceKey::None).unwrap();
        let slices: Vec<_> = slicer.iter().collect();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].materialize(&vis).unwrap(), vis);
    }

    #[test]
    fn test_time_slicing_groups_strided_rows() {
        let vis = dataset(&[5.0, 3.0, 5.0, 3.0, 9.0]);
        let slicer = VisSlicer::new(&vis, SliceKey::Time).unwrap();
        let rows: Vec<_> = slicer.iter().map(|s| s.rows).collect();
        assert_eq!(rows, vec![vec![0, 2], vec![1, 3], vec![4]]);
        assert_partition(&slicer, 5);
    }

    #[test]
    fn test_row_slicing() {
        let vis = dataset(&[0.0; 10]);
        let slicer = VisSlicer::new(&vis, SliceKey::Rows { slices: 3 }).unwrap();
        let lens: Vec<_> = slicer.iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![4, 4, 2]);
        assert_partition(&slicer, 10);
    }

    #[test]
    fn test_more_slices_than_rows() {
        let vis = dataset(&[0.0, 1.0]);
        let slicer = VisSlicer::new(&vis, SliceKey::Rows { slices: 8 }).unwrap();
        assert_eq!(slicer.slice_count(), 2);
        assert!(slicer.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let vis = Visibility::new(vec![1.0e8]);
        for key in [SliceKey::None, SliceKey::Time, SliceKey::Rows { slices: 4 }] {
            let slicer = VisSlicer::new(&vis, key).unwrap();
            assert_eq!(slicer.iter().count(), 0);
        }
    }

    #[test]
    fn test_zero_row_slices_rejected() {
        let vis = dataset(&[0.0]);
        assert!(matches!(
            VisSlicer::new(&vis, SliceKey::Rows { slices: 0 }),
            Err(FacetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_materialized_slice_is_independent() {
        let vis = dataset(&[0.0, 1.0]);
        let slicer = VisSlicer::new(&vis, SliceKey::Time).unwrap();
        let mut part = slicer.slice(1).unwrap().materialize(&vis).unwrap();
        part.zero_vis();
        assert_eq!(vis.vis[1], Complex64::new(1.0, 0.0));
    }

    #[test]
    fn test_nan_timestamps_form_one_slice() {
        let vis = dataset(&[0.0, f64::NAN, 0.0, -f64::NAN, -0.0]);
        let slicer = VisSlicer::new(&vis, SliceKey::Time).unwrap();
        let rows: Vec<_> = slicer.iter().map(|s| s.rows).collect();
        assert_eq!(rows, vec![vec![0, 2, 4], vec![1, 3]]);
        assert_partition(&slicer, 5);
    }

    proptest! {
        #[test]
        fn prop_slices_partition_rows(
            times in proptest::collection::vec(0u8..7, 0..60),
            slices in 1usize..9,
            key_sel in 0u8..3,
        ) {
            // 6 stands in for a missing timestamp
            let times: Vec<f64> = times
                .into_iter()
                .map(|t| if t == 6 { f64::NAN } else { f64::from(t) })
                .collect();
            let vis = dataset(&times);
            let key = match key_sel {
                0 => SliceKey::None,
                1 => SliceKey::Time,
                _ => SliceKey::Rows { slices },
            };
            let slicer = VisSlicer::new(&vis, key).unwrap();
            let total: usize = slicer.iter().map(|s| s.len()).sum();
            prop_assert_eq!(total, vis.nrows());
            assert_partition(&slicer, vis.nrows());
        }
    }
}
