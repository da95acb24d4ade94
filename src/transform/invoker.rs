//! Applies a kernel to one work item.
//!
//! The invoker prepares independent copies of the kernel inputs (the slice's
//! rows and the facet's footprint), calls the kernel, and checks the output
//! shape. It never accumulates.

use crate::core::error::FailureCause;
use crate::core::image::Image;
use crate::core::visibility::Visibility;
use crate::partition::facets::FacetDescriptor;
use crate::partition::work::WorkItem;
use crate::transform::{InvertTransform, PredictTransform};
use log::debug;
use ndarray::Array2;

/// Predicted rows for one work item.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictPartial {
    /// Work item index.
    pub item: usize,
    /// Parent row index of each predicted row.
    pub rows: Vec<usize>,
    /// The slice with `vis` holding this facet's contribution.
    pub vis: Visibility,
}

/// Image contribution for one work item.
#[derive(Debug, Clone, PartialEq)]
pub struct InvertPartial {
    /// Work item index.
    pub item: usize,
    /// Where `image` sits in the full field.
    pub facet: FacetDescriptor,
    /// Contribution over the facet footprint.
    pub image: Image,
    /// Sum of weights, `(nchan, npol)`.
    pub weight: Array2<f64>,
}

/// Pass-through adapter around a kernel.
pub struct TransformInvoker<'a, T: ?Sized> {
    transform: &'a T,
}

impl<'a, T: ?Sized> TransformInvoker<'a, T> {
    /// Wrap a kernel.
    pub fn new(transform: &'a T) -> Self {
        Self { transform }
    }
}

fn prepare(item: &WorkItem, vis: &Visibility, image: &Image) -> Result<(Visibility, Image), FailureCause> {
    let rows = item
        .slice
        .materialize(vis)
        .map_err(|e| FailureCause::Input(e.to_string()))?;
    let footprint = image
        .sub_image(&item.facet)
        .map_err(|e| FailureCause::Input(e.to_string()))?;
    Ok((rows, footprint))
}

impl<T: PredictTransform + ?Sized> TransformInvoker<'_, T> {
    /// Predict the facet's contribution to the slice's rows.
    ///
    /// The kernel receives the rows with `vis` zeroed.
    pub fn predict(
        &self,
        item: &WorkItem,
        vis: &Visibility,
        model: &Image,
    ) -> Result<PredictPartial, FailureCause> {
        let (mut rows, footprint) = prepare(item, vis, model)?;
        rows.zero_vis();
        debug!(
            "predict: facet {} ({}x{} at {},{}), slice {} ({} rows)",
            item.facet.index,
            item.facet.height,
            item.facet.width,
            item.facet.y,
            item.facet.x,
            item.slice.index,
            item.slice.len()
        );

        let predicted = self
            .transform
            .predict(rows, &footprint)
            .map_err(|e| FailureCause::Kernel(e.to_string()))?;

        if predicted.nrows() != item.slice.len() {
            return Err(FailureCause::MalformedOutput(format!(
                "predict returned {} rows, expected {}",
                predicted.nrows(),
                item.slice.len()
            )));
        }
        predicted
            .validate()
            .map_err(|e| FailureCause::MalformedOutput(e.to_string()))?;

        Ok(PredictPartial {
            item: item.index,
            rows: item.slice.rows.clone(),
            vis: predicted,
        })
    }
}

impl<T: InvertTransform + ?Sized> TransformInvoker<'_, T> {
    /// Image the slice's rows onto the facet footprint.
    pub fn invert(
        &self,
        item: &WorkItem,
        vis: &Visibility,
        template: &Image,
        make_psf: bool,
    ) -> Result<InvertPartial, FailureCause> {
        let (rows, footprint) = prepare(item, vis, template)?;
        debug!(
            "invert: facet {} ({}x{} at {},{}), slice {} ({} rows), psf={}",
            item.facet.index,
            item.facet.height,
            item.facet.width,
            item.facet.y,
            item.facet.x,
            item.slice.index,
            item.slice.len(),
            make_psf
        );

        let (image, weight) = self
            .transform
            .invert(&rows, &footprint, make_psf)
            .map_err(|e| FailureCause::Kernel(e.to_string()))?;

        let expected = item.facet.shape();
        if image.shape() != expected {
            return Err(FailureCause::MalformedOutput(format!(
                "invert returned image {:?}, expected {:?}",
                image.shape().dim(),
                expected.dim()
            )));
        }
        if weight.dim() != (expected.nchan, expected.npol) {
            return Err(FailureCause::MalformedOutput(format!(
                "invert returned weights {:?}, expected {:?}",
                weight.dim(),
                (expected.nchan, expected.npol)
            )));
        }

        Ok(InvertPartial {
            item: item.index,
            facet: item.facet,
            image,
            weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::KernelError;
    use crate::core::image::WcsDescriptor;
    use crate::core::visibility::VisRow;
    use crate::partition::facets::{FacetGrid, FacetLayout, RemainderPolicy};
    use crate::partition::slices::{SliceKey, VisSlicer};
    use crate::partition::work::enumerate_work;
    use ndarray::Array4;
    use num_complex::Complex64;

    fn fixtures() -> (Visibility, Image, Vec<WorkItem>) {
        let vis = Visibility::from_rows(
            vec![1.0e8],
            (0..4).map(|i| VisRow {
                uvw: [i as f64, 0.0, 0.0],
                time: (i / 2) as f64,
                antenna1: 0,
                antenna2: 1,
                vis: Complex64::new(99.0, 0.0),
                weight: 2.0,
            }),
        );
        let image = Image::new(
            Array4::from_shape_fn((1, 1, 4, 4), |(_, _, y, x)| (y * 4 + x) as f64),
            WcsDescriptor::default(),
        );
        let grid = FacetGrid::new(image.shape(), FacetLayout::Count(2), RemainderPolicy::Strict).unwrap();
        let slicer = VisSlicer::new(&vis, SliceKey::Time).unwrap();
        let items = enumerate_work(&grid, &slicer);
        (vis, image, items)
    }

    fn sum_predict(mut vis: Visibility, model: &Image) -> Result<Visibility, KernelError> {
        let total = model.data.sum();
        for v in vis.vis.iter_mut() {
            *v += Complex64::new(total, 0.0);
        }
        Ok(vis)
    }

    #[test]
    fn test_predict_sees_zeroed_slice_and_footprint() {
        let (vis, image, items) = fixtures();
        let invoker = TransformInvoker::new(&sum_predict);
        // facet 1 covers pixels 2,3,6,7; slice 1 holds rows 2 and 3
        let partial = invoker.predict(&items[3], &vis, &image).unwrap();
        assert_eq!(partial.rows, vec![2, 3]);
        assert_eq!(partial.vis.vis, vec![Complex64::new(18.0, 0.0); 2]);
        assert_eq!(vis.vis[2], Complex64::new(99.0, 0.0));
    }

    #[test]
    fn test_predict_rejects_wrong_row_count() {
        let (vis, image, items) = fixtures();
        let drop_row = |mut v: Visibility, _: &Image| -> Result<Visibility, KernelError> {
            v = v.select_rows(&[0])?;
            Ok(v)
        };
        let err = TransformInvoker::new(&drop_row)
            .predict(&items[0], &vis, &image)
            .unwrap_err();
        assert!(matches!(err, FailureCause::MalformedOutput(_)));
    }

    #[test]
    fn test_kernel_error_is_reported() {
        let (vis, image, items) = fixtures();
        let failing = |_: Visibility, _: &Image| -> Result<Visibility, KernelError> {
            Err("gridding failed".into())
        };
        let err = TransformInvoker::new(&failing)
            .predict(&items[0], &vis, &image)
            .unwrap_err();
        assert_eq!(err, FailureCause::Kernel("gridding failed".to_string()));
    }

    #[test]
    fn test_invert_returns_footprint_contribution() {
        let (vis, image, items) = fixtures();
        let weight_sum = |v: &Visibility, t: &Image, psf: bool| -> Result<(Image, Array2<f64>), KernelError> {
            let mut out = Image::zeros_like(t);
            out.data.fill(if psf { 1.0 } else { v.nrows() as f64 });
            let mut wt = t.zero_weights();
            wt.fill(v.weight.iter().sum());
            Ok((out, wt))
        };
        let invoker = TransformInvoker::new(&weight_sum);
        let partial = invoker.invert(&items[2], &vis, &image, false).unwrap();
        assert_eq!(partial.facet, items[2].facet);
        assert_eq!(partial.image.data.dim(), (1, 1, 2, 2));
        assert!(partial.image.data.iter().all(|&p| p == 2.0));
        assert_eq!(partial.weight[[0, 0]], 4.0);

        let psf = invoker.invert(&items[2], &vis, &image, true).unwrap();
        assert!(psf.image.data.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_invert_rejects_full_size_image() {
        let (vis, image, items) = fixtures();
        let full = image.clone();
        let wrong = move |_: &Visibility, _: &Image, _: bool| -> Result<(Image, Array2<f64>), KernelError> {
            Ok((full.clone(), full.zero_weights()))
        };
        let err = TransformInvoker::new(&wrong)
            .invert(&items[0], &vis, &image, false)
            .unwrap_err();
        assert!(matches!(err, FailureCause::MalformedOutput(_)));
    }
}
