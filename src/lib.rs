//! # BeingDB
//!
//! A read-mostly fact store. A knowledge base is authored as Prolog-style
//! ground facts, one predicate per file; a compile step materializes the
//! sources into an immutable, content-addressed pack snapshot; a server
//! answers conjunctive queries with joins over that snapshot and never
//! mutates it.
//!
//! ## Pipeline
//!
//! ```text
//! source files
//!     |
//! [Fact Parser]      -> (name, args) per line
//!     |
//! [Compile Pipeline] -> arity validation, per-predicate reporting
//!     |
//! [Encoder]          -> [predicate, encoded_args] -> value blob
//!     |
//! Pack Snapshot (immutable, content-addressed)
//!     ^
//! [Query Engine]     <- [Query Parser] <- request
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use beingdb::{compile, execution::ExecutionConfig, Pack, QueryEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = compile::compile(Path::new("./predicates"), Path::new("./pack"))?;
//! assert!(report.success());
//!
//! let pack = Arc::new(Pack::open("./pack")?);
//! let engine = QueryEngine::new(pack, ExecutionConfig::default());
//!
//! let query = beingdb::parser::parse_query("created(tina_keane, Work)").unwrap();
//! let result = engine.execute(&query)?;
//! for binding in &result.bindings {
//!     println!("{}", binding["Work"]);
//! }
//! # Ok(())
//! # }
//! ```

// Term types shared by facts and queries
pub mod ast;

// Textual front ends
pub mod parser;

// Typed fact encoding onto the two-level key space
pub mod encoding;

// Pack snapshot store (writer + read-only handle)
pub mod pack;

// Source directory -> pack snapshot
pub mod compile;

// Execution hardening: deadline, cancellation, intermediate cap
pub mod execution;

// Pattern matching, joins, validation, result envelope
pub mod engine;

// Configuration system
pub mod config;

// HTTP surface
pub mod server;

// Re-export the types most callers need
pub use ast::{Arg, Pattern, Query, Term};
pub use compile::{CompileError, CompileReport};
pub use config::Config;
pub use engine::{
    optimize, result_to_json, validate_query, QueryEngine, QueryResult, ResultEnvelope,
    ValidationError,
};
pub use execution::{
    CancelHandle, ExecutionConfig, ExecutionError, ExecutionResult, QueryTimeout,
};
pub use pack::{Pack, PackError, PackWriter};
pub use parser::{parse_fact_line, parse_query};
