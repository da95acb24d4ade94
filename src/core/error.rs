//! Error types for Facetry.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Identify the failing work item (facet index, slice index) when a kernel fails
//! - Separate fail-fast configuration/partition problems from per-item failures
//! - Carry kernel errors of any type through nested faceted transforms

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type returned by caller-supplied predict/invert kernels.
///
/// Boxed so that any error type can be returned, including [`FacetError`]
/// from a nested faceted transform.
pub type KernelError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Image axis being partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Image rows.
    Y,
    /// Image columns.
    X,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Y => write!(f, "y"),
            Axis::X => write!(f, "x"),
        }
    }
}

/// Top-level error type for Facetry.
#[derive(Error, Debug)]
pub enum FacetError {
    #[error("Cannot partition {axis} extent {extent} into {facets} facets: {reason}")]
    Partition {
        /// Axis that could not be split.
        axis: Axis,
        /// Pixel extent of that axis.
        extent: usize,
        /// Requested facets per axis.
        facets: usize,
        /// Why the split failed.
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Transform(#[from] TransformFailure),

    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid parameter map: {0}")]
    Parameters(#[from] serde_json::Error),
}

/// Why a single work item failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    #[error("could not prepare kernel input: {0}")]
    Input(String),

    #[error("kernel error: {0}")]
    Kernel(String),

    #[error("malformed kernel output: {0}")]
    MalformedOutput(String),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// A failed (facet, slice) work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformFailure {
    /// Position of the item in facet-outer, slice-inner order.
    pub item: usize,
    /// Index of the facet in raster order.
    pub facet_index: usize,
    /// Index of the visibility slice.
    pub slice_index: usize,
    /// Rayon worker that ran the item, when executed on the pool.
    pub worker: Option<usize>,
    /// What went wrong.
    pub cause: FailureCause,
    /// Further failures observed in the same run (collect-all policy).
    pub additional_failures: usize,
}

impl fmt::Display for TransformFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transform failed on work item {} (facet {}, slice {})",
            self.item, self.facet_index, self.slice_index
        )?;
        if let Some(worker) = self.worker {
            write!(f, " on worker {}", worker)?;
        }
        write!(f, ": {}", self.cause)?;
        if self.additional_failures > 0 {
            write!(f, " ({} more item(s) failed)", self.additional_failures)?;
        }
        Ok(())
    }
}

impl std::error::Error for TransformFailure {}

impl TransformFailure {
    /// Whether the failure came from a worker terminating abnormally.
    pub fn is_worker_failure(&self) -> bool {
        matches!(self.cause, FailureCause::Panicked(_))
    }
}

impl FacetError {
    /// Shorthand for a partition error.
    pub fn partition(axis: Axis, extent: usize, facets: usize, reason: impl Into<String>) -> Self {
        FacetError::Partition {
            axis,
            extent,
            facets,
            reason: reason.into(),
        }
    }

    /// The failing work item, if this error came from a transform.
    pub fn transform_failure(&self) -> Option<&TransformFailure> {
        match self {
            FacetError::Transform(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the error was raised before any work item was dispatched.
    pub fn is_fail_fast(&self) -> bool {
        !matches!(self, FacetError::Transform(_))
    }
}

/// Non-fatal condition recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineWarning {
    /// Nothing to do: the visibility set has no rows.
    EmptyInput {
        /// Number of facets that would have been processed.
        facets: usize,
    },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineWarning::EmptyInput { facets } => write!(
                f,
                "Visibility set is empty; no work items for {} facet(s)",
                facets
            ),
        }
    }
}

/// Result type alias for Facetry operations.
pub type FacetResult<T> = Result<T, FacetError>;
