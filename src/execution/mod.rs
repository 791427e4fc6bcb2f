//! Query Execution Hardening
//!
//! Guards that keep a hostile or unlucky query from taking the server
//! down: a cooperative deadline with external cancellation, and a cap on
//! intermediate join state. The engine polls both between fact-list
//! iterations, so a runaway scan is aborted within one iteration of the
//! guard tripping.

mod limits;
mod timeout;

pub use limits::{ResourceError, ResourceLimits};
pub use timeout::{CancelHandle, QueryTimeout, TimeoutError};

use std::time::Duration;

/// Configuration for query execution.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Query deadline (None = no deadline)
    pub timeout: Option<Duration>,

    /// Resource limits
    pub limits: ResourceLimits,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            timeout: Some(Duration::from_secs(5)),
            limits: ResourceLimits::default(),
        }
    }
}

impl ExecutionConfig {
    /// No deadline, no caps (for testing).
    pub fn unlimited() -> Self {
        ExecutionConfig {
            timeout: None,
            limits: ResourceLimits::unlimited(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_max_intermediate_results(mut self, cap: usize) -> Self {
        self.limits = self.limits.with_max_intermediate_results(cap);
        self
    }
}

/// Execution error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    /// Deadline elapsed or the query was cancelled
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// Resource limit exceeded
    #[error("{0}")]
    Resource(#[from] ResourceError),
}

/// Result type for execution operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutionConfig::default();
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.limits.max_intermediate_results, Some(10_000));
    }

    #[test]
    fn test_unlimited_config() {
        let config = ExecutionConfig::unlimited();
        assert!(config.timeout.is_none());
        assert!(config.limits.max_intermediate_results.is_none());
    }

    #[test]
    fn test_builder() {
        let config = ExecutionConfig::default()
            .with_timeout(Duration::from_secs(30))
            .with_max_intermediate_results(500);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.limits.max_intermediate_results, Some(500));

        let config = config.without_timeout();
        assert!(config.timeout.is_none());
    }
}
