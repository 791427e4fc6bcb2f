//! # Query and Fact AST Types
//!
//! Shared term types for ground facts and query patterns.
//!
//! Facts carry only constants (`Arg`); query patterns additionally carry
//! variables and wildcards (`Term`). The atom/string distinction is a tagged
//! value that survives the pack encoding, but matching and bindings compare
//! textual content only, so clients never need to care about the tag.

use serde::{Deserialize, Serialize};

/// A term appearing in a query pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// Unquoted constant, text taken verbatim.
    Atom(String),
    /// Double-quoted constant, text after escape processing.
    String(String),
    /// Named placeholder, binds to the matched argument's text.
    Var(String),
    /// `_`: matches any argument and does not bind.
    Wildcard,
}

impl Term {
    /// Textual content for constant terms; `None` for variables and wildcards.
    pub fn constant_text(&self) -> Option<&str> {
        match self {
            Term::Atom(s) | Term::String(s) => Some(s),
            Term::Var(_) | Term::Wildcard => None,
        }
    }

    /// Whether this term constrains the match (neither variable nor wildcard).
    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Atom(_) | Term::String(_))
    }
}

/// An argument of a stored ground fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arg {
    /// Unquoted constant.
    Atom(String),
    /// Double-quoted constant (unescaped content).
    String(String),
}

impl Arg {
    /// Textual content, independent of the atom/string tag.
    pub fn text(&self) -> &str {
        match self {
            Arg::Atom(s) | Arg::String(s) => s,
        }
    }

    /// Consume the argument, yielding its textual content.
    pub fn into_text(self) -> String {
        match self {
            Arg::Atom(s) | Arg::String(s) => s,
        }
    }
}

/// A named term tuple used to match facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub terms: Vec<Term>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, terms: Vec<Term>) -> Self {
        Pattern {
            name: name.into(),
            terms,
        }
    }

    /// Number of constant (non-variable, non-wildcard) terms.
    ///
    /// Used by the optimizer as a selectivity estimate: more constants bind
    /// more in the source and cut the result tree earlier.
    pub fn constant_count(&self) -> usize {
        self.terms.iter().filter(|t| t.is_constant()).count()
    }

    pub fn arity(&self) -> usize {
        self.terms.len()
    }
}

/// A conjunctive query: an ordered list of patterns plus the distinct
/// variables they mention.
///
/// `variables` is kept in first-occurrence order over `patterns`; callers
/// that reorder patterns must rebuild the query so the two stay consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub patterns: Vec<Pattern>,
    pub variables: Vec<String>,
}

impl Query {
    /// Build a query from patterns, computing `variables` in
    /// first-occurrence order.
    pub fn new(patterns: Vec<Pattern>) -> Self {
        let mut variables = Vec::new();
        for pattern in &patterns {
            for term in &pattern.terms {
                if let Term::Var(name) = term {
                    if !variables.iter().any(|v| v == name) {
                        variables.push(name.clone());
                    }
                }
            }
        }
        Query {
            patterns,
            variables,
        }
    }
}
