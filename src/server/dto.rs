//! HTTP Data Transfer Objects
//!
//! Request/response types for the query surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Query execution request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QueryRequest {
    /// The conjunctive query to execute, e.g.
    /// `created(tina_keane, Work), shown_in(Work, E)`
    pub query: String,
    /// Complete bindings to skip before collecting
    #[serde(default)]
    pub offset: Option<i64>,
    /// Maximum bindings to return (composed with the server ceiling)
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Server identity
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionDto {
    pub name: String,
    pub version: String,
}

/// One predicate with its arity
#[derive(Debug, Serialize, ToSchema)]
pub struct PredicateInfoDto {
    pub name: String,
    pub arity: usize,
}

/// All predicates in the served snapshot
#[derive(Debug, Serialize, ToSchema)]
pub struct PredicatesDto {
    pub predicates: Vec<PredicateInfoDto>,
}

/// Full enumeration of one predicate's facts (no pagination)
#[derive(Debug, Serialize, ToSchema)]
pub struct PredicateFactsDto {
    pub predicate: String,
    /// Each fact as its argument texts, in pack key order
    pub facts: Vec<Vec<String>>,
}
