//! Query Validation
//!
//! Request-boundary checks that run before any execution: pagination
//! bounds, predicate-name shape, and rejection of repeated predicates
//! (a self-join degenerates into a Cartesian product of the predicate
//! with itself, which this engine does not support).

use thiserror::Error;

use crate::ast::Query;

/// Validation errors, surfaced as 400s at the HTTP boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid offset: {0} (must be >= 0)")]
    InvalidOffset(i64),

    #[error("invalid limit: {0} (must be > 0)")]
    InvalidLimit(i64),

    #[error("invalid predicate name: {0:?} (expected [a-z0-9_]+)")]
    InvalidPredicateName(String),

    #[error(
        "predicate {0:?} appears more than once: repeated predicates form a Cartesian product and are not supported"
    )]
    CartesianProduct(String),
}

/// Whether a name is a well-formed predicate name (`[a-z0-9_]+`).
pub fn is_valid_predicate_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Validate a query and its pagination parameters.
///
/// Checks run in order: offset, limit, predicate names, repeated
/// predicates.
pub fn validate_query(
    query: &Query,
    offset: Option<i64>,
    limit: Option<i64>,
) -> Result<(), ValidationError> {
    if let Some(offset) = offset {
        if offset < 0 {
            return Err(ValidationError::InvalidOffset(offset));
        }
    }

    if let Some(limit) = limit {
        if limit <= 0 {
            return Err(ValidationError::InvalidLimit(limit));
        }
    }

    for pattern in &query.patterns {
        if !is_valid_predicate_name(&pattern.name) {
            return Err(ValidationError::InvalidPredicateName(pattern.name.clone()));
        }
    }

    for (i, pattern) in query.patterns.iter().enumerate() {
        if query.patterns[..i].iter().any(|p| p.name == pattern.name) {
            return Err(ValidationError::CartesianProduct(pattern.name.clone()));
        }
    }

    Ok(())
}
