//! Work items: the cross product of facets and visibility slices.

use crate::partition::facets::{FacetDescriptor, FacetGrid};
use crate::partition::slices::{VisSlice, VisSlicer};

/// One (facet, visibility slice) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Position in facet-outer, slice-inner order.
    pub index: usize,
    /// Facet to transform.
    pub facet: FacetDescriptor,
    /// Rows to transform.
    pub slice: VisSlice,
}

impl WorkItem {
    /// Raster index of the facet.
    pub fn facet_index(&self) -> usize {
        self.facet.index
    }

    /// Index of the visibility slice.
    pub fn slice_index(&self) -> usize {
        self.slice.index
    }
}

/// Enumerate every work item, facets outer and slices inner.
pub fn enumerate_work(grid: &FacetGrid, slicer: &VisSlicer<'_>) -> Vec<WorkItem> {
    let slices: Vec<VisSlice> = slicer.iter().collect();
    grid.iter()
        .flat_map(|facet| slices.iter().cloned().map(move |slice| (facet, slice)))
        .enumerate()
        .map(|(index, (facet, slice))| WorkItem { index, facet, slice })
        .collect()
}
