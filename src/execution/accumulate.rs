//! Folding partial results into the final output.
//!
//! Both folds are sums, so the final value does not depend on the order
//! partials arrive in (up to floating-point rounding). The engine still
//! folds in work-item order so that sequential and pooled runs agree
//! bit-for-bit.

use crate::core::error::{FacetError, FacetResult};
use crate::core::image::Image;
use crate::core::visibility::Visibility;
use crate::transform::invoker::{InvertPartial, PredictPartial};
use ndarray::Array2;

/// Combines partial results.
pub trait Accumulate {
    /// One work item's contribution.
    type Partial;
    /// The combined result.
    type Output;

    /// Add one contribution.
    fn fold(&mut self, partial: Self::Partial) -> FacetResult<()>;

    /// Number of contributions folded so far.
    fn folded(&self) -> usize;

    /// Take the combined result.
    fn finish(self) -> Self::Output;

    /// Fold every partial in turn.
    fn fold_all<I>(&mut self, partials: I) -> FacetResult<()>
    where
        I: IntoIterator<Item = Self::Partial>,
        Self: Sized,
    {
        for partial in partials {
            self.fold(partial)?;
        }
        Ok(())
    }
}

/// Sums predicted visibilities by row.
#[derive(Debug, Clone)]
pub struct PredictAccumulator {
    output: Visibility,
    folded: usize,
}

impl PredictAccumulator {
    /// Start from `input` with its `vis` column zeroed.
    pub fn new(input: &Visibility) -> Self {
        let mut output = input.clone();
        output.zero_vis();
        Self { output, folded: 0 }
    }

    /// Start from `input` untouched. Used when there is nothing to fold.
    pub fn passthrough(input: &Visibility) -> Self {
        Self {
            output: input.clone(),
            folded: 0,
        }
    }
}

impl Accumulate for PredictAccumulator {
    type Partial = PredictPartial;
    type Output = Visibility;

    fn fold(&mut self, partial: PredictPartial) -> FacetResult<()> {
        if partial.rows.len() != partial.vis.nrows() {
            return Err(FacetError::InvalidInput(format!(
                "partial for item {} maps {} rows but holds {}",
                partial.item,
                partial.rows.len(),
                partial.vis.nrows()
            )));
        }
        let nrows = self.output.nrows();
        if let Some(&row) = partial.rows.iter().find(|&&row| row >= nrows) {
            return Err(FacetError::InvalidInput(format!(
                "partial for item {} refers to row {} of {}",
                partial.item, row, nrows
            )));
        }
        for (&row, value) in partial.rows.iter().zip(&partial.vis.vis) {
            self.output.vis[row] += *value;
        }
        self.folded += 1;
        Ok(())
    }

    fn folded(&self) -> usize {
        self.folded
    }

    fn finish(self) -> Visibility {
        self.output
    }
}

/// Sums facet images into the full field and adds weight totals.
#[derive(Debug, Clone)]
pub struct InvertAccumulator {
    image: Image,
    weight: Array2<f64>,
    folded: usize,
}

impl InvertAccumulator {
    /// A zero image and zero weight shaped like `template`.
    pub fn new(template: &Image) -> Self {
        Self {
            image: Image::zeros_like(template),
            weight: template.zero_weights(),
            folded: 0,
        }
    }
}

impl Accumulate for InvertAccumulator {
    type Partial = InvertPartial;
    type Output = (Image, Array2<f64>);

    fn fold(&mut self, partial: InvertPartial) -> FacetResult<()> {
        if partial.weight.dim() != self.weight.dim() {
            return Err(FacetError::InvalidInput(format!(
                "partial for item {} has weights {:?}, expected {:?}",
                partial.item,
                partial.weight.dim(),
                self.weight.dim()
            )));
        }
        self.image.add_footprint(&partial.facet, &partial.image)?;
        self.weight += &partial.weight;
        self.folded += 1;
        Ok(())
    }

    fn folded(&self) -> usize {
        self.folded
    }

    fn finish(self) -> (Image, Array2<f64>) {
        (self.image, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image::{ImageShape, WcsDescriptor};
    use crate::core::visibility::VisRow;
    use crate::partition::facets::{FacetGrid, FacetLayout, RemainderPolicy};
    use approx::assert_relative_eq;
    use ndarray::Array4;
    use num_complex::Complex64;
    use proptest::prelude::*;

    fn visibility(n: usize) -> Visibility {
        Visibility::from_rows(
            vec![1.0e8],
            (0..n).map(|i| VisRow {
                uvw: [i as f64, 1.0, 0.0],
                time: i as f64,
                antenna1: 0,
                antenna2: 1,
                vis: Complex64::new(7.0, 7.0),
                weight: 1.0,
            }),
        )
    }

    fn predict_partials(base: &Visibility) -> Vec<PredictPartial> {
        // 3 facets x 2 slices of a 6-row dataset
        let mut partials = Vec::new();
        for facet in 0..3 {
            for slice in 0..2 {
                let rows: Vec<usize> = (slice * 3..slice * 3 + 3).collect();
                let mut vis = base.select_rows(&rows).unwrap();
                for (k, v) in vis.vis.iter_mut().enumerate() {
                    *v = Complex64::new(0.1 * (facet + 1) as f64 + k as f64, 1.0 / (facet + 3) as f64);
                }
                partials.push(PredictPartial { item: facet * 2 + slice, rows, vis });
            }
        }
        partials
    }

    fn invert_partials(template: &Image) -> Vec<InvertPartial> {
        let grid = FacetGrid::new(template.shape(), FacetLayout::Count(2), RemainderPolicy::Strict).unwrap();
        grid.iter()
            .map(|facet| {
                let mut image = template.sub_image(&facet).unwrap();
                image.data.mapv_inplace(|p| p * 1.5 + facet.index as f64 / 7.0);
                let mut weight = template.zero_weights();
                weight.fill(0.3 * (facet.index + 1) as f64);
                InvertPartial { item: facet.index, facet, image, weight }
            })
            .collect()
    }

    fn template() -> Image {
        Image::new(
            Array4::from_shape_fn((2, 1, 4, 4), |(c, _, y, x)| (c * 16 + y * 4 + x) as f64 / 3.0),
            WcsDescriptor::default(),
        )
    }

    #[test]
    fn test_predict_sums_by_row() {
        let base = visibility(6);
        let mut acc = PredictAccumulator::new(&base);
        acc.fold_all(predict_partials(&base)).unwrap();
        assert_eq!(acc.folded(), 6);
        let out = acc.finish();

        // row 1: k = 1 for every facet
        let expected_re = (0.1 + 1.0) + (0.2 + 1.0) + (0.3 + 1.0);
        let expected_im = 1.0 / 3.0 + 1.0 / 4.0 + 1.0 / 5.0;
        assert_relative_eq!(out.vis[1].re, expected_re, max_relative = 1e-12);
        assert_relative_eq!(out.vis[1].im, expected_im, max_relative = 1e-12);
        assert_eq!(out.time, base.time);
    }

    #[test]
    fn test_predict_passthrough_leaves_input() {
        let base = visibility(3);
        assert_eq!(PredictAccumulator::passthrough(&base).finish(), base);
    }

    #[test]
    fn test_predict_rejects_bad_rows() {
        let base = visibility(2);
        let mut acc = PredictAccumulator::new(&base);
        let partial = PredictPartial {
            item: 0,
            rows: vec![5],
            vis: base.select_rows(&[0]).unwrap(),
        };
        assert!(acc.fold(partial).is_err());
    }

    #[test]
    fn test_invert_places_footprints() {
        let template = template();
        let mut acc = InvertAccumulator::new(&template);
        acc.fold_all(invert_partials(&template)).unwrap();
        let (image, weight) = acc.finish();

        // pixel (3, 3) lies in facet 3
        let expected = template.data[[1, 0, 3, 3]] * 1.5 + 3.0 / 7.0;
        assert_relative_eq!(image.data[[1, 0, 3, 3]], expected, max_relative = 1e-12);
        assert_relative_eq!(weight[[0, 0]], 0.3 * 10.0, max_relative = 1e-12);
        assert_eq!(weight.dim(), (2, 1));
    }

    #[test]
    fn test_invert_empty_is_zero() {
        let template = template();
        let (image, weight) = InvertAccumulator::new(&template).finish();
        assert!(image.data.iter().all(|&p| p == 0.0));
        assert!(weight.iter().all(|&w| w == 0.0));
        assert_eq!(image.shape(), ImageShape { nchan: 2, npol: 1, ny: 4, nx: 4 });
    }

    proptest! {
        #[test]
        fn prop_predict_fold_order_independent(
            order in Just((0..6).collect::<Vec<usize>>()).prop_shuffle()
        ) {
            let base = visibility(6);
            let partials = predict_partials(&base);

            let mut reference = PredictAccumulator::new(&base);
            reference.fold_all(partials.clone()).unwrap();
            let reference = reference.finish();

            let mut shuffled = PredictAccumulator::new(&base);
            shuffled.fold_all(order.iter().map(|&i| partials[i].clone())).unwrap();
            let shuffled = shuffled.finish();

            for (a, b) in reference.vis.iter().zip(&shuffled.vis) {
                prop_assert!((a - b).norm() <= 1e-10 * a.norm().max(1.0));
            }
        }

        #[test]
        fn prop_invert_fold_order_independent(
            order in Just((0..4).collect::<Vec<usize>>()).prop_shuffle()
        ) {
            let template = template();
            let partials = invert_partials(&template);

            let mut reference = InvertAccumulator::new(&template);
            reference.fold_all(partials.clone()).unwrap();
            let (ref_image, ref_weight) = reference.finish();

            let mut shuffled = InvertAccumulator::new(&template);
            shuffled.fold_all(order.iter().map(|&i| partials[i].clone())).unwrap();
            let (image, weight) = shuffled.finish();

            for (a, b) in ref_image.data.iter().zip(image.data.iter()) {
                prop_assert!((a - b).abs() <= 1e-10 * a.abs().max(1.0));
            }
            for (a, b) in ref_weight.iter().zip(weight.iter()) {
                prop_assert!((a - b).abs() <= 1e-10 * a.abs().max(1.0));
            }
        }
    }
}
