//! Execution of faceted runs.
//!
//! This module schedules work items, tracks their progress, and folds their
//! partial results into the final output.

pub mod accumulate;
pub mod engine;
pub mod progress;
pub mod strategy;

pub use accumulate::{Accumulate, InvertAccumulator, PredictAccumulator};
pub use engine::{invert_by_facets, predict_by_facets, ExecutionStats, FacetEngine, FacetRun};
pub use progress::{ProgressCallback, ProgressTracker, ProgressUpdate};
pub use strategy::{ExecutionStrategy, Executor, FailurePolicy};
