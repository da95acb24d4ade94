//! Run configuration.
//!
//! A [`FacetConfig`] is passed explicitly to every entry point. It can be
//! built in code with the `with_*` methods, read from TOML, or taken from a
//! string-keyed parameter map. Keys that are not set fall back to the
//! defaults: one facet, no visibility slicing, sequential execution.
//!
//! ```toml
//! facets = 4
//! remainder = "strict"
//! slicing = "time"
//! failure_policy = "abort_on_first"
//!
//! [strategy.parallel]
//! workers = 8
//! ```

use crate::core::error::{FacetError, FacetResult};
use crate::execution::strategy::{ExecutionStrategy, FailurePolicy};
use crate::partition::facets::{FacetLayout, RemainderPolicy};
use crate::partition::slices::SliceKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default number of facets per axis.
pub const DEFAULT_FACETS: usize = 1;

/// Configuration for a faceted predict or invert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetConfig {
    /// Facets per axis.
    pub facets: usize,
    /// Target facet edge in pixels. Overrides `facets` when set.
    pub facet_size: Option<usize>,
    /// Handling of extents that do not divide evenly.
    pub remainder: RemainderPolicy,
    /// Visibility slicing key.
    pub slicing: SliceKey,
    /// Sequential or worker-pool execution.
    pub strategy: ExecutionStrategy,
    /// What the pool does after a failure.
    pub failure_policy: FailurePolicy,
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            facets: DEFAULT_FACETS,
            facet_size: None,
            remainder: RemainderPolicy::Strict,
            slicing: SliceKey::None,
            strategy: ExecutionStrategy::Sequential,
            failure_policy: FailurePolicy::AbortOnFirst,
        }
    }
}

impl FacetConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of facets per axis.
    pub fn with_facets(mut self, facets: usize) -> Self {
        self.facets = facets;
        self.facet_size = None;
        self
    }

    /// Set a target facet size in pixels.
    pub fn with_facet_size(mut self, size: usize) -> Self {
        self.facet_size = Some(size);
        self
    }

    /// Set the remainder policy.
    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }

    /// Set the visibility slicing key.
    pub fn with_slicing(mut self, slicing: SliceKey) -> Self {
        self.slicing = slicing;
        self
    }

    /// Run on a worker pool of the given size (0 = all available units).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.strategy = ExecutionStrategy::Parallel { workers };
        self
    }

    /// Run sequentially.
    pub fn sequential(mut self) -> Self {
        self.strategy = ExecutionStrategy::Sequential;
        self
    }

    /// Set the pool failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// The facet layout this configuration asks for.
    pub fn layout(&self) -> FacetLayout {
        match self.facet_size {
            Some(size) => FacetLayout::Size(size),
            None => FacetLayout::Count(self.facets),
        }
    }

    /// Reject settings that can never work, before any image is seen.
    pub fn validate(&self) -> FacetResult<()> {
        if self.facet_size.is_none() && self.facets == 0 {
            return Err(FacetError::InvalidConfig(
                "facets must be at least 1".to_string(),
            ));
        }
        if self.facet_size == Some(0) {
            return Err(FacetError::InvalidConfig(
                "facet_size must be at least 1 pixel".to_string(),
            ));
        }
        self.slicing.validate()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> FacetResult<Self> {
        let config: FacetConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> FacetResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Build from a parameter map, ignoring keys meant for other components.
    pub fn from_parameters(parameters: &HashMap<String, serde_json::Value>) -> FacetResult<Self> {
        let object: serde_json::Map<String, serde_json::Value> = parameters
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let config: FacetConfig = serde_json::from_value(serde_json::Value::Object(object))?;
        config.validate()?;
        Ok(config)
    }
}
