//! Image container used by the facet engine.
//!
//! An [`Image`] is a 4-D array indexed by `(channel, polarization, y, x)` with
//! a [`WcsDescriptor`] for the two spatial axes. Only the spatial plane is
//! ever partitioned; channel and polarization extents are shared by every
//! facet.

use crate::core::error::{FacetError, FacetResult};
use crate::partition::facets::FacetDescriptor;
use ndarray::{s, Array2, Array4};
use serde::{Deserialize, Serialize};

/// World-coordinate descriptor for the spatial axes.
///
/// Indices follow the image layout: `[0]` is the y axis, `[1]` is x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WcsDescriptor {
    /// Reference pixel (zero-based).
    pub crpix: [f64; 2],
    /// World coordinate at the reference pixel.
    pub crval: [f64; 2],
    /// Coordinate increment per pixel.
    pub cdelt: [f64; 2],
    /// Axis type names.
    pub ctype: [String; 2],
}

impl Default for WcsDescriptor {
    fn default() -> Self {
        Self {
            crpix: [0.0, 0.0],
            crval: [0.0, 0.0],
            cdelt: [1.0, 1.0],
            ctype: ["DEC--SIN".to_string(), "RA---SIN".to_string()],
        }
    }
}

impl WcsDescriptor {
    /// Descriptor centred on an image of the given spatial shape.
    pub fn centred(ny: usize, nx: usize, cellsize: f64) -> Self {
        Self {
            crpix: [(ny / 2) as f64, (nx / 2) as f64],
            cdelt: [cellsize, -cellsize],
            ..Self::default()
        }
    }

    /// The same world frame seen from a sub-image starting at `(y, x)`.
    pub fn shifted(&self, y_offset: usize, x_offset: usize) -> Self {
        Self {
            crpix: [
                self.crpix[0] - y_offset as f64,
                self.crpix[1] - x_offset as f64,
            ],
            ..self.clone()
        }
    }
}

/// Shape of an image: `(nchan, npol, ny, nx)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    /// Number of frequency channels.
    pub nchan: usize,
    /// Number of polarizations.
    pub npol: usize,
    /// Height in pixels.
    pub ny: usize,
    /// Width in pixels.
    pub nx: usize,
}

impl ImageShape {
    /// The shape as an ndarray dimension tuple.
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        (self.nchan, self.npol, self.ny, self.nx)
    }
}

/// A channel/polarization cube of real-valued sky pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Pixel data indexed `[chan, pol, y, x]`.
    pub data: Array4<f64>,
    /// Spatial coordinate frame.
    pub wcs: WcsDescriptor,
}

impl Image {
    /// Wrap existing data.
    pub fn new(data: Array4<f64>, wcs: WcsDescriptor) -> Self {
        Self { data, wcs }
    }

    /// An all-zero image of the given shape.
    pub fn zeros(shape: ImageShape, wcs: WcsDescriptor) -> Self {
        Self {
            data: Array4::zeros(shape.dim()),
            wcs,
        }
    }

    /// An all-zero image with the same shape and frame as `other`.
    pub fn zeros_like(other: &Image) -> Self {
        Self::zeros(other.shape(), other.wcs.clone())
    }

    /// Image shape.
    pub fn shape(&self) -> ImageShape {
        let (nchan, npol, ny, nx) = self.data.dim();
        ImageShape { nchan, npol, ny, nx }
    }

    /// Height and width of the spatial plane.
    pub fn extent(&self) -> (usize, usize) {
        let shape = self.shape();
        (shape.ny, shape.nx)
    }

    /// Zero-valued weight total matching this image's channel/polarization axes.
    pub fn zero_weights(&self) -> Array2<f64> {
        let shape = self.shape();
        Array2::zeros((shape.nchan, shape.npol))
    }

    /// Copy out the footprint of a facet as an independent image.
    ///
    /// The returned image's WCS reference pixel is shifted so that world
    /// coordinates of every pixel are unchanged.
    pub fn sub_image(&self, facet: &FacetDescriptor) -> FacetResult<Image> {
        self.check_footprint(facet)?;
        let view = self.data.slice(s![
            ..,
            ..,
            facet.y..facet.bottom(),
            facet.x..facet.right()
        ]);
        Ok(Image {
            data: view.to_owned(),
            wcs: self.wcs.shifted(facet.y, facet.x),
        })
    }

    /// Add `patch` into the footprint of `facet`.
    pub fn add_footprint(&mut self, facet: &FacetDescriptor, patch: &Image) -> FacetResult<()> {
        self.check_footprint(facet)?;
        let expected = (self.shape().nchan, self.shape().npol, facet.height, facet.width);
        if patch.data.dim() != expected {
            return Err(FacetError::InvalidInput(format!(
                "patch shape {:?} does not match facet footprint {:?}",
                patch.data.dim(),
                expected
            )));
        }
        let mut view = self.data.slice_mut(s![
            ..,
            ..,
            facet.y..facet.bottom(),
            facet.x..facet.right()
        ]);
        view += &patch.data;
        Ok(())
    }

    fn check_footprint(&self, facet: &FacetDescriptor) -> FacetResult<()> {
        let (ny, nx) = self.extent();
        if !facet.is_within_bounds(ny, nx) {
            return Err(FacetError::InvalidInput(format!(
                "facet {:?} exceeds image extent {}x{}",
                facet, ny, nx
            )));
        }
        Ok(())
    }
}
