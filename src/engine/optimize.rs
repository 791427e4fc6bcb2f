//! Pattern Reordering
//!
//! Selectivity heuristic: patterns with more constant terms are assumed to
//! match fewer facts, so running them first binds more variables early and
//! cuts the join tree sooner. The sort is stable, so ties keep their
//! source order and execution stays deterministic.

use std::cmp::Reverse;

use crate::ast::Query;

/// Reorder a query's patterns descending by constant count and rebuild the
/// variable list in first-occurrence order over the new pattern order.
pub fn optimize(query: &Query) -> Query {
    let mut patterns = query.patterns.clone();
    patterns.sort_by_key(|p| Reverse(p.constant_count()));
    Query::new(patterns)
}
