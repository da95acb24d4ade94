//! The transform interface that facet partitioning wraps.
//!
//! Any predict or invert kernel implements [`PredictTransform`] or
//! [`InvertTransform`]. Closures with the matching signature implement them
//! automatically. Kernel-specific options (cell size, oversampling, ...)
//! live in the kernel value itself, so the engine never has to know about
//! them.
//!
//! The engine makes no assumption about what a kernel does beyond its
//! declared input and output shapes. A faceted transform is itself a
//! kernel (see [`nested`]), which is how partitioning strategies compose.

pub mod invoker;
pub mod nested;

use crate::core::error::KernelError;
use crate::core::image::Image;
use crate::core::visibility::Visibility;
use ndarray::Array2;

pub use invoker::{InvertPartial, PredictPartial, TransformInvoker};
pub use nested::{FacetedInvert, FacetedPredict};

/// Forward transform: sky model image to visibilities.
pub trait PredictTransform: Send + Sync {
    /// Return `vis` with its `vis` column populated from `model`.
    ///
    /// The returned dataset must have the same number of rows as `vis`.
    fn predict(&self, vis: Visibility, model: &Image) -> Result<Visibility, KernelError>;
}

/// Inverse transform: visibilities to an image and its weight total.
pub trait InvertTransform: Send + Sync {
    /// Image `vis` onto the grid described by `template`.
    ///
    /// Returns an image with `template`'s shape and a `(nchan, npol)` sum of
    /// weights. When `make_psf` is set the point spread function is made
    /// instead of the dirty image.
    fn invert(
        &self,
        vis: &Visibility,
        template: &Image,
        make_psf: bool,
    ) -> Result<(Image, Array2<f64>), KernelError>;
}

impl<F> PredictTransform for F
where
    F: Fn(Visibility, &Image) -> Result<Visibility, KernelError> + Send + Sync,
{
    fn predict(&self, vis: Visibility, model: &Image) -> Result<Visibility, KernelError> {
        self(vis, model)
    }
}

impl<F> InvertTransform for F
where
    F: Fn(&Visibility, &Image, bool) -> Result<(Image, Array2<f64>), KernelError> + Send + Sync,
{
    fn invert(
        &self,
        vis: &Visibility,
        template: &Image,
        make_psf: bool,
    ) -> Result<(Image, Array2<f64>), KernelError> {
        self(vis, template, make_psf)
    }
}
