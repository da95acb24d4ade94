//! Faceted transforms usable as kernels.
//!
//! Wrapping a kernel in [`FacetedPredict`] or [`FacetedInvert`] gives a value
//! that implements the same trait, so one partitioning can be nested inside
//! another: facets of facets, or facets whose kernel slices by time.

use crate::core::config::FacetConfig;
use crate::core::error::{FacetResult, KernelError};
use crate::core::image::Image;
use crate::core::visibility::Visibility;
use crate::execution::engine::FacetEngine;
use crate::transform::{InvertTransform, PredictTransform};
use ndarray::Array2;

/// A predict kernel run facet by facet.
#[derive(Debug, Clone)]
pub struct FacetedPredict<P> {
    engine: FacetEngine,
    inner: P,
}

impl<P: PredictTransform> FacetedPredict<P> {
    /// Partition `inner` according to `config`.
    pub fn new(inner: P, config: FacetConfig) -> FacetResult<Self> {
        Ok(Self {
            engine: FacetEngine::new(config)?,
            inner,
        })
    }

    /// The wrapped kernel.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: PredictTransform> PredictTransform for FacetedPredict<P> {
    fn predict(&self, vis: Visibility, model: &Image) -> Result<Visibility, KernelError> {
        Ok(self.engine.predict(&vis, model, &self.inner)?)
    }
}

/// An invert kernel run facet by facet.
#[derive(Debug, Clone)]
pub struct FacetedInvert<I> {
    engine: FacetEngine,
    inner: I,
}

impl<I: InvertTransform> FacetedInvert<I> {
    /// Partition `inner` according to `config`.
    pub fn new(inner: I, config: FacetConfig) -> FacetResult<Self> {
        Ok(Self {
            engine: FacetEngine::new(config)?,
            inner,
        })
    }

    /// The wrapped kernel.
    pub fn inner(&self) -> &I {
        &self.inner
    }
}

impl<I: InvertTransform> InvertTransform for FacetedInvert<I> {
    fn invert(
        &self,
        vis: &Visibility,
        template: &Image,
        make_psf: bool,
    ) -> Result<(Image, Array2<f64>), KernelError> {
        Ok(self.engine.invert(vis, template, &self.inner, make_psf)?)
    }
}
