//! Partitioning of the work: image facets and visibility slices.
//!
//! The cross product of a [`FacetGrid`] pass and a [`VisSlicer`] pass is the
//! set of work items processed by the execution engine.

pub mod facets;
pub mod slices;
pub mod work;

pub use facets::{FacetDescriptor, FacetGrid, FacetIter, FacetLayout, RemainderPolicy};
pub use slices::{SliceKey, VisSlice, VisSliceIter, VisSlicer};
pub use work::{enumerate_work, WorkItem};
