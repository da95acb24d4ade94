//! # Facetry - Facet-partitioned Imaging Transforms
//!
//! Facetry splits a radio-interferometric predict or invert into independent
//! pieces of work: a regular grid of image facets crossed with slices of the
//! visibility data. Each piece is handed to a caller-supplied transform
//! kernel, and the pieces are summed back into a full-field result.
//!
//! ## Features
//!
//! - **Kernel-agnostic**: Any degridder or gridder implementing
//!   [`PredictTransform`] or [`InvertTransform`] (closures included) can be
//!   partitioned
//! - **Deterministic**: Sequential and worker-pool runs give identical results
//! - **Fail-fast planning**: Partition and configuration errors surface before
//!   any kernel runs
//! - **Composable**: A faceted transform is itself a transform and can be nested
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use facetry::prelude::*;
//!
//! let config = FacetConfig::new()
//!     .with_facets(4)
//!     .with_slicing(SliceKey::Time)
//!     .with_workers(8);
//!
//! // `degrid` is any `Fn(Visibility, &Image) -> Result<Visibility, KernelError>`
//! let predicted = predict_by_facets(&vis, &model, &degrid, &config)?;
//!
//! // `grid` is any `Fn(&Visibility, &Image, bool) -> Result<(Image, Array2<f64>), KernelError>`
//! let (dirty, sumwt) = invert_by_facets(&vis, &template, &grid, false, &config)?;
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`core`]: Visibility and image types, configuration, and errors
//! - [`partition`]: Facet grids, visibility slicing, and work enumeration
//! - [`transform`]: The kernel traits and the per-item invoker
//! - [`execution`]: Execution strategies, progress, accumulation, and the engine
//!
//! [`PredictTransform`]: transform::PredictTransform
//! [`InvertTransform`]: transform::InvertTransform

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod partition;
pub mod transform;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use facetry::prelude::*;
/// ```
pub mod prelude {
    // Data
    pub use crate::core::image::{Image, ImageShape, WcsDescriptor};
    pub use crate::core::visibility::{VisRow, Visibility};

    // Configuration
    pub use crate::core::config::FacetConfig;

    // Errors
    pub use crate::core::error::{
        EngineWarning, FacetError, FacetResult, FailureCause, KernelError, TransformFailure,
    };

    // Partitioning
    pub use crate::partition::facets::{FacetDescriptor, FacetGrid, FacetLayout, RemainderPolicy};
    pub use crate::partition::slices::{SliceKey, VisSlice, VisSlicer};
    pub use crate::partition::work::WorkItem;

    // Transforms
    pub use crate::transform::nested::{FacetedInvert, FacetedPredict};
    pub use crate::transform::{InvertTransform, PredictTransform};

    // Execution
    pub use crate::execution::engine::{
        invert_by_facets, predict_by_facets, ExecutionStats, FacetEngine, FacetRun,
    };
    pub use crate::execution::progress::{ProgressCallback, ProgressUpdate};
    pub use crate::execution::strategy::{ExecutionStrategy, FailurePolicy};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
