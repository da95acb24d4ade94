//! Core data types for Facetry.
//!
//! This module contains the values that flow through a faceted run:
//! - Visibility datasets and their rows
//! - Images with their world coordinates
//! - Run configuration
//! - Error and warning types

pub mod config;
pub mod error;
pub mod image;
pub mod visibility;

// Re-export commonly used types
pub use config::FacetConfig;
pub use error::{Axis, EngineWarning, FacetError, FacetResult, FailureCause, KernelError, TransformFailure};
pub use image::{Image, ImageShape, WcsDescriptor};
pub use visibility::{VisRow, Visibility};
