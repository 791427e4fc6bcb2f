//! Resource Limits Module
//!
//! Bounds the intermediate state of a join. The engine counts every
//! candidate binding it produces (partial bindings included, before any
//! offset is applied) and checks the count against the configured cap
//! between iterations; a breach aborts the run.

use thiserror::Error;

/// Resource limit error
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// The join frontier grew past the configured cap
    #[error(
        "intermediate result limit exceeded: produced {produced} candidate bindings, limit {limit}"
    )]
    IntermediateCapExceeded { limit: usize, produced: usize },
}

/// Resource limits for one query execution.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum candidate bindings produced during a join (None = unlimited)
    pub max_intermediate_results: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            max_intermediate_results: Some(10_000),
        }
    }
}

impl ResourceLimits {
    /// No restrictions (for testing).
    pub fn unlimited() -> Self {
        ResourceLimits {
            max_intermediate_results: None,
        }
    }

    pub fn with_max_intermediate_results(mut self, cap: usize) -> Self {
        self.max_intermediate_results = Some(cap);
        self
    }

    /// Check a running candidate-binding count against the cap.
    pub fn check_intermediate(&self, produced: usize) -> Result<(), ResourceError> {
        if let Some(limit) = self.max_intermediate_results {
            if produced > limit {
                return Err(ResourceError::IntermediateCapExceeded { limit, produced });
            }
        }
        Ok(())
    }
}
