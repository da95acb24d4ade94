//! Raster partitioning of an image plane into facets.
//!
//! A [`FacetGrid`] is validated once, up front, and can then be iterated any
//! number of times. Each pass yields the same [`FacetDescriptor`]s in
//! row-major raster order (top-to-bottom, left-to-right) and tiles the
//! parent image exactly: no gaps, no overlap.
//!
//! # Uneven extents
//!
//! With [`RemainderPolicy::Strict`] (the default) an extent that does not
//! divide evenly by the facet count is a partition error. With
//! [`RemainderPolicy::AbsorbIntoEdge`] the last row and column of facets
//! grow to take up the remainder. Pixels are never dropped.

use crate::core::error::{Axis, FacetError, FacetResult};
use crate::core::image::ImageShape;
use serde::{Deserialize, Serialize};

/// How a facet count is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetLayout {
    /// Number of facets per axis.
    Count(usize),
    /// Target facet edge length in pixels.
    Size(usize),
}

impl Default for FacetLayout {
    fn default() -> Self {
        FacetLayout::Count(1)
    }
}

/// What to do with pixels left over by an uneven division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Require the extent to divide evenly.
    #[default]
    Strict,
    /// Grow the last facet on each axis by the remainder.
    AbsorbIntoEdge,
}

/// An axis-aligned sub-rectangle of an image's spatial plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FacetDescriptor {
    /// Raster index of this facet.
    pub index: usize,
    /// Row offset from the image origin.
    pub y: usize,
    /// Column offset from the image origin.
    pub x: usize,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
    /// Shape of the image this facet belongs to.
    pub parent: ImageShape,
}

impl FacetDescriptor {
    /// Create a new facet descriptor.
    pub fn new(
        index: usize,
        y: usize,
        x: usize,
        height: usize,
        width: usize,
        parent: ImageShape,
    ) -> Self {
        Self {
            index,
            y,
            x,
            height,
            width,
            parent,
        }
    }

    /// A single facet covering the whole image.
    pub fn whole(parent: ImageShape) -> Self {
        Self::new(0, 0, 0, parent.ny, parent.nx, parent)
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Area in pixels.
    pub fn area(&self) -> usize {
        self.height * self.width
    }

    /// Whether the facet lies entirely inside an `ny` x `nx` plane.
    pub fn is_within_bounds(&self, ny: usize, nx: usize) -> bool {
        self.bottom() <= ny && self.right() <= nx
    }

    /// Whether the pixel `(y, x)` falls inside this facet.
    pub fn contains(&self, y: usize, x: usize) -> bool {
        y >= self.y && y < self.bottom() && x >= self.x && x < self.right()
    }

    /// Shape of the facet's footprint, keeping the parent's channel/pol axes.
    pub fn shape(&self) -> ImageShape {
        ImageShape {
            ny: self.height,
            nx: self.width,
            ..self.parent
        }
    }
}

/// Split `extent` into `count` spans, returning the span size and the
/// extra pixels given to the last span.
fn split_axis(
    axis: Axis,
    extent: usize,
    count: usize,
    policy: RemainderPolicy,
) -> FacetResult<(usize, usize)> {
    if count == 0 {
        return Err(FacetError::partition(axis, extent, count, "facet count must be at least 1"));
    }
    if count > extent {
        return Err(FacetError::partition(
            axis,
            extent,
            count,
            "more facets than pixels",
        ));
    }
    let size = extent / count;
    let remainder = extent % count;
    match policy {
        RemainderPolicy::Strict if remainder != 0 => Err(FacetError::partition(
            axis,
            extent,
            count,
            format!("extent is not divisible (remainder {})", remainder),
        )),
        _ => Ok((size, remainder)),
    }
}

/// A validated raster partition of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetGrid {
    parent: ImageShape,
    facets_per_axis: usize,
    facet_height: usize,
    facet_width: usize,
    extra_y: usize,
    extra_x: usize,
}

impl FacetGrid {
    /// Partition `parent` according to `layout` and `policy`.
    pub fn new(parent: ImageShape, layout: FacetLayout, policy: RemainderPolicy) -> FacetResult<Self> {
        let count = match layout {
            FacetLayout::Count(n) => n,
            FacetLayout::Size(0) => {
                return Err(FacetError::InvalidConfig(
                    "facet size must be at least 1 pixel".to_string(),
                ))
            }
            FacetLayout::Size(size) => {
                if parent.ny % size != 0 || parent.nx % size != 0 {
                    if policy == RemainderPolicy::Strict {
                        let (axis, extent) = if parent.ny % size != 0 {
                            (Axis::Y, parent.ny)
                        } else {
                            (Axis::X, parent.nx)
                        };
                        return Err(FacetError::partition(
                            axis,
                            extent,
                            extent / size,
                            format!("extent is not a multiple of facet size {}", size),
                        ));
                    }
                }
                if parent.ny / size != parent.nx / size {
                    return Err(FacetError::InvalidConfig(format!(
                        "facet size {} gives a non-square grid on a {}x{} image",
                        size, parent.ny, parent.nx
                    )));
                }
                parent.ny / size
            }
        };

        let (facet_height, extra_y) = split_axis(Axis::Y, parent.ny, count, policy)?;
        let (facet_width, extra_x) = split_axis(Axis::X, parent.nx, count, policy)?;

        Ok(Self {
            parent,
            facets_per_axis: count,
            facet_height,
            facet_width,
            extra_y,
            extra_x,
        })
    }

    /// A grid with a single facet covering the whole image.
    pub fn single(parent: ImageShape) -> Self {
        Self {
            parent,
            facets_per_axis: 1,
            facet_height: parent.ny,
            facet_width: parent.nx,
            extra_y: 0,
            extra_x: 0,
        }
    }

    /// Facets per axis.
    pub fn facets_per_axis(&self) -> usize {
        self.facets_per_axis
    }

    /// Total number of facets.
    pub fn facet_count(&self) -> usize {
        self.facets_per_axis * self.facets_per_axis
    }

    /// Shape of the partitioned image.
    pub fn parent(&self) -> ImageShape {
        self.parent
    }

    /// Descriptor for the facet at raster position `index`.
    pub fn facet(&self, index: usize) -> Option<FacetDescriptor> {
        if index >= self.facet_count() {
            return None;
        }
        let n = self.facets_per_axis;
        let (row, col) = (index / n, index % n);
        let height = self.facet_height + if row == n - 1 { self.extra_y } else { 0 };
        let width = self.facet_width + if col == n - 1 { self.extra_x } else { 0 };
        Some(FacetDescriptor::new(
            index,
            row * self.facet_height,
            col * self.facet_width,
            height,
            width,
            self.parent,
        ))
    }

    /// Iterate over facets in raster order. Each call starts a fresh pass.
    pub fn iter(&self) -> FacetIter<'_> {
        FacetIter {
            grid: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a FacetGrid {
    type Item = FacetDescriptor;
    type IntoIter = FacetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy raster-order iterator over a [`FacetGrid`].
#[derive(Debug, Clone)]
pub struct FacetIter<'a> {
    grid: &'a FacetGrid,
    next: usize,
}

impl Iterator for FacetIter<'_> {
    type Item = FacetDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let facet = self.grid.facet(self.next)?;
        self.next += 1;
        Some(facet)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.facet_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FacetIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shape(ny: usize, nx: usize) -> ImageShape {
        ImageShape { nchan: 1, npol: 1, ny, nx }
    }

    fn coverage(grid: &FacetGrid) -> Vec<u32> {
        let parent = grid.parent();
        let mut hits = vec![0u32; parent.ny * parent.nx];
        for facet in grid {
            for y in facet.y..facet.bottom() {
                for x in facet.x..facet.right() {
                    hits[y * parent.nx + x] += 1;
                }
            }
        }
        hits
    }

    #[test]
    fn test_single_facet_is_whole_image() {
        let grid = FacetGrid::new(shape(7, 5), FacetLayout::Count(1), RemainderPolicy::Strict).unwrap();
        let facets: Vec<_> = grid.iter().collect();
        assert_eq!(facets, vec![FacetDescriptor::whole(shape(7, 5))]);
        assert_eq!(FacetGrid::single(shape(7, 5)), grid);
    }

    #[test]
    fn test_raster_order() {
        let grid = FacetGrid::new(shape(4, 4), FacetLayout::Count(2), RemainderPolicy::Strict).unwrap();
        let offsets: Vec<_> = grid.iter().map(|f| (f.index, f.y, f.x)).collect();
        assert_eq!(offsets, vec![(0, 0, 0), (1, 0, 2), (2, 2, 0), (3, 2, 2)]);
        assert!(grid.iter().all(|f| f.height == 2 && f.width == 2));
    }

    #[test]
    fn test_restartable() {
        let grid = FacetGrid::new(shape(6, 6), FacetLayout::Count(3), RemainderPolicy::Strict).unwrap();
        let first: Vec<_> = grid.iter().collect();
        let second: Vec<_> = grid.iter().collect();
        assert_eq!(first, second);
        assert_eq!(grid.iter().len(), 9);
    }

    #[test]
    fn test_strict_rejects_uneven_extent() {
        let err = FacetGrid::new(shape(5, 4), FacetLayout::Count(2), RemainderPolicy::Strict).unwrap_err();
        assert!(matches!(err, FacetError::Partition { axis: Axis::Y, extent: 5, facets: 2, .. }));
    }

    #[test]
    fn test_absorb_into_edge() {
        let grid =
            FacetGrid::new(shape(5, 7), FacetLayout::Count(2), RemainderPolicy::AbsorbIntoEdge).unwrap();
        let facets: Vec<_> = grid.iter().collect();
        assert_eq!((facets[0].height, facets[0].width), (2, 3));
        assert_eq!((facets[3].height, facets[3].width), (3, 4));
        assert!(coverage(&grid).iter().all(|&h| h == 1));
    }

    #[test]
    fn test_zero_and_oversized_counts() {
        assert!(FacetGrid::new(shape(4, 4), FacetLayout::Count(0), RemainderPolicy::Strict).is_err());
        assert!(
            FacetGrid::new(shape(4, 4), FacetLayout::Count(5), RemainderPolicy::AbsorbIntoEdge).is_err()
        );
    }

    #[test]
    fn test_layout_by_size() {
        let grid = FacetGrid::new(shape(8, 8), FacetLayout::Size(2), RemainderPolicy::Strict).unwrap();
        assert_eq!(grid.facets_per_axis(), 4);
        assert!(FacetGrid::new(shape(8, 8), FacetLayout::Size(3), RemainderPolicy::Strict).is_err());
        assert!(FacetGrid::new(shape(8, 8), FacetLayout::Size(0), RemainderPolicy::Strict).is_err());
    }

    #[test]
    fn test_facet_shape_keeps_cube_axes() {
        let parent = ImageShape { nchan: 3, npol: 2, ny: 4, nx: 4 };
        let grid = FacetGrid::new(parent, FacetLayout::Count(2), RemainderPolicy::Strict).unwrap();
        let facet = grid.facet(1).unwrap();
        assert_eq!(facet.shape(), ImageShape { nchan: 3, npol: 2, ny: 2, nx: 2 });
        assert!(facet.contains(0, 3));
        assert!(!facet.contains(2, 3));
        assert!(grid.facet(4).is_none());
    }

    proptest! {
        #[test]
        fn prop_even_grid_tiles_exactly(n in 1usize..6, fy in 1usize..6, fx in 1usize..6) {
            let grid = FacetGrid::new(shape(n * fy, n * fx), FacetLayout::Count(n), RemainderPolicy::Strict).unwrap();
            prop_assert_eq!(grid.iter().count(), n * n);
            prop_assert!(coverage(&grid).iter().all(|&h| h == 1));
        }

        #[test]
        fn prop_absorb_never_drops_pixels(n in 1usize..5, ny in 5usize..23, nx in 5usize..23) {
            let grid = FacetGrid::new(shape(ny, nx), FacetLayout::Count(n), RemainderPolicy::AbsorbIntoEdge).unwrap();
            let area: usize = grid.iter().map(|f| f.area()).sum();
            prop_assert_eq!(area, ny * nx);
            prop_assert!(coverage(&grid).iter().all(|&h| h == 1));
        }
    }
}
