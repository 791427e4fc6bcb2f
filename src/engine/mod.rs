//! # Query Engine
//!
//! Pattern matching and conjunctive joins over a pack snapshot.
//!
//! Single-pattern queries are a scan-and-filter over one predicate tree.
//! Conjunctions run as a streaming nested-loop join: patterns are first
//! reordered by selectivity ([`optimize`]), then executed left to right
//! carrying a partial binding, with facts pulled straight off the tree in
//! key order so intermediate memory stays proportional to the join depth.
//! The deadline and the intermediate-result cap are polled at every
//! recursion step and every fact iteration.

pub mod optimize;
pub mod result;
pub mod safety;

pub use optimize::optimize;
pub use result::{result_to_json, Binding, QueryResult, ResultEnvelope};
pub use safety::{validate_query, ValidationError};

use std::sync::Arc;

use crate::ast::{Arg, Pattern, Query, Term};
use crate::encoding::decode_args;
use crate::execution::{ExecutionConfig, ExecutionError, ExecutionResult, QueryTimeout};
use crate::pack::Pack;

/// One position of a concrete pattern handed to the matcher: either a
/// literal content string or a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Literal(String),
    Any,
}

/// Signal from a result sink: keep producing or short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Query engine over a shared, read-only pack handle.
pub struct QueryEngine {
    pack: Arc<Pack>,
    config: ExecutionConfig,
}

impl QueryEngine {
    pub fn new(pack: Arc<Pack>, config: ExecutionConfig) -> Self {
        QueryEngine { pack, config }
    }

    pub fn pack(&self) -> &Arc<Pack> {
        &self.pack
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Predicate names present in the snapshot.
    pub fn list_predicates(&self) -> Vec<String> {
        self.pack.list_predicates()
    }

    /// Predicate names with their arity, taken from any one stored fact.
    /// Empty predicates report arity 0.
    pub fn list_predicates_with_arity(&self) -> Vec<(String, usize)> {
        self.pack
            .list_predicates()
            .into_iter()
            .map(|name| {
                let arity = self
                    .pack
                    .tree(&name)
                    .and_then(|tree| {
                        tree.get(0)
                            .map(|(key, value)| decode_args(key, value).len())
                    })
                    .unwrap_or(0);
                (name, arity)
            })
            .collect()
    }

    /// All facts under a predicate, decoded, in key order.
    pub fn query_all(&self, name: &str) -> Vec<Vec<Arg>> {
        let Some(tree) = self.pack.tree(name) else {
            return Vec::new();
        };
        tree.list(0, None)
            .iter()
            .map(|(key, value)| decode_args(key, value))
            .collect()
    }

    /// Facts under `name` matching `pattern`, with native offset/limit.
    ///
    /// A fact matches when arities agree and each literal matcher equals
    /// the argument's textual content.
    pub fn query_predicate(
        &self,
        name: &str,
        pattern: &[Matcher],
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> Vec<Vec<Arg>> {
        let Some(tree) = self.pack.tree(name) else {
            return Vec::new();
        };

        let offset = offset.unwrap_or(0);
        let mut skipped = 0usize;
        let mut out = Vec::new();

        for index in 0..tree.len() {
            let Some((key, value)) = tree.get(index) else {
                break;
            };
            let fact = decode_args(key, value);
            if !fact_matches(&fact, pattern) {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            out.push(fact);
            if limit.is_some_and(|l| out.len() >= l) {
                break;
            }
        }

        out
    }

    /// Execute a query to full materialization.
    pub fn execute(&self, query: &Query) -> ExecutionResult<QueryResult> {
        let guard = QueryTimeout::new(self.config.timeout);
        self.execute_with(query, &guard)
    }

    /// Execute with a caller-supplied guard (so the caller can keep a
    /// [`crate::execution::CancelHandle`]).
    pub fn execute_with(
        &self,
        query: &Query,
        guard: &QueryTimeout,
    ) -> ExecutionResult<QueryResult> {
        let query = optimize(query);
        let mut bindings = Vec::new();

        self.run_join(&query, guard, &mut |binding| {
            bindings.push(binding.clone());
            Flow::Continue
        })?;

        let total = bindings.len();
        Ok(QueryResult {
            variables: query.variables,
            bindings,
            total: Some(total),
        })
    }

    /// Execute with bounded-memory pagination: skip `offset` complete
    /// bindings, collect at most `limit`, then cease all remaining
    /// recursion. No counting pass runs, so the result carries no total.
    pub fn execute_streaming(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> ExecutionResult<QueryResult> {
        let guard = QueryTimeout::new(self.config.timeout);
        self.execute_streaming_with(query, offset, limit, &guard)
    }

    /// Streaming execution with a caller-supplied guard.
    pub fn execute_streaming_with(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
        guard: &QueryTimeout,
    ) -> ExecutionResult<QueryResult> {
        let query = optimize(query);
        let mut bindings = Vec::new();

        if limit > 0 {
            let mut complete = 0usize;
            self.run_join(&query, guard, &mut |binding| {
                complete += 1;
                if complete <= offset {
                    return Flow::Continue;
                }
                bindings.push(binding.clone());
                if bindings.len() >= limit {
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            })?;
        }

        Ok(QueryResult {
            variables: query.variables,
            bindings,
            total: None,
        })
    }

    fn run_join(
        &self,
        query: &Query,
        guard: &QueryTimeout,
        sink: &mut dyn FnMut(&Binding) -> Flow,
    ) -> ExecutionResult<Flow> {
        let mut ctx = JoinCtx {
            guard,
            config: &self.config,
            produced: 0,
        };
        let mut binding = Binding::new();
        self.join(&query.patterns, 0, &mut binding, &mut ctx, sink)
    }

    /// One level of the nested-loop join: resolve the pattern at `depth`
    /// against the current binding, iterate its predicate's facts, extend
    /// the binding per match and recurse. Exhausting the pattern list
    /// hands the complete binding to the sink.
    fn join(
        &self,
        patterns: &[Pattern],
        depth: usize,
        binding: &mut Binding,
        ctx: &mut JoinCtx<'_>,
        sink: &mut dyn FnMut(&Binding) -> Flow,
    ) -> ExecutionResult<Flow> {
        ctx.guard.check()?;

        let Some(pattern) = patterns.get(depth) else {
            return Ok(sink(binding));
        };

        let matchers = resolve_terms(&pattern.terms, binding);
        let Some(tree) = self.pack.tree(&pattern.name) else {
            // Unknown predicate: the conjunction has no solutions down
            // this branch.
            return Ok(Flow::Continue);
        };

        for index in 0..tree.len() {
            ctx.guard.check()?;

            let Some((key, value)) = tree.get(index) else {
                break;
            };
            let fact = decode_args(key, value);
            if !fact_matches(&fact, &matchers) {
                continue;
            }

            // Re-binding an existing variable to a different value prunes
            // the branch.
            let Some(added) = extend_binding(&pattern.terms, &fact, binding) else {
                continue;
            };

            ctx.produced += 1;
            let flow = match ctx.config.limits.check_intermediate(ctx.produced) {
                Err(e) => Err(ExecutionError::from(e)),
                Ok(()) => self.join(patterns, depth + 1, binding, ctx, sink),
            };

            for name in &added {
                binding.remove(name);
            }

            if flow? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }

        Ok(Flow::Continue)
    }
}

struct JoinCtx<'a> {
    guard: &'a QueryTimeout,
    config: &'a ExecutionConfig,
    /// Candidate bindings produced so far, partial included, before and
    /// regardless of any offset.
    produced: usize,
}

/// Resolve a pattern's terms against a partial binding into concrete
/// matchers: constants and bound variables become literals, wildcards and
/// unbound variables match anything.
pub fn resolve_terms(terms: &[Term], binding: &Binding) -> Vec<Matcher> {
    terms
        .iter()
        .map(|term| match term {
            Term::Atom(s) | Term::String(s) => Matcher::Literal(s.clone()),
            Term::Wildcard => Matcher::Any,
            Term::Var(name) => binding
                .get(name)
                .map_or(Matcher::Any, |value| Matcher::Literal(value.clone())),
        })
        .collect()
}

/// Arity must agree; each literal matcher compares against the argument's
/// textual content, atom/string tags ignored.
fn fact_matches(fact: &[Arg], pattern: &[Matcher]) -> bool {
    if fact.len() != pattern.len() {
        return false;
    }
    fact.iter().zip(pattern).all(|(arg, matcher)| match matcher {
        Matcher::Any => true,
        Matcher::Literal(text) => arg.text() == text,
    })
}

/// Bind the pattern's still-unbound variables to the fact's argument
/// texts. Returns the names added, or `None` on a conflicting re-bind
/// (in which case the binding is left untouched).
fn extend_binding(terms: &[Term], fact: &[Arg], binding: &mut Binding) -> Option<Vec<String>> {
    let mut added = Vec::new();

    for (term, arg) in terms.iter().zip(fact) {
        if let Term::Var(name) = term {
            match binding.get(name) {
                Some(existing) if existing != arg.text() => {
                    for name in &added {
                        binding.remove(name);
                    }
                    return None;
                }
                Some(_) => {}
                None => {
                    binding.insert(name.clone(), arg.text().to_string());
                    added.push(name.clone());
                }
            }
        }
    }

    Some(added)
}
