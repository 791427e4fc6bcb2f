//! Query Results and the JSON Envelope
//!
//! A [`QueryResult`] carries bindings in production order plus the
//! variable list in engine order. [`result_to_json`] wraps it in the
//! pagination envelope returned over HTTP.

use std::collections::HashMap;

use serde::Serialize;

/// One complete variable assignment.
pub type Binding = HashMap<String, String>;

/// Bindings produced by a query execution.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Variable names in engine (post-optimization) order.
    pub variables: Vec<String>,
    /// Complete bindings in production order.
    pub bindings: Vec<Binding>,
    /// Bindings before pagination. `None` on the streaming path, which
    /// skips the counting pass; callers document the omission.
    pub total: Option<usize>,
}

impl QueryResult {
    /// Apply a pagination window in place. `total` keeps the
    /// pre-pagination count.
    pub fn paginate(&mut self, offset: usize, limit: usize) {
        if offset >= self.bindings.len() {
            self.bindings.clear();
            return;
        }
        self.bindings.drain(..offset);
        self.bindings.truncate(limit);
    }
}

/// The JSON result envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    /// Variable names in engine order.
    pub variables: Vec<String>,
    /// One object per binding, mapping variable name to value.
    pub results: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Number of results after pagination.
    pub count: usize,
    /// Total bindings before pagination; absent when the streaming path
    /// skipped the counting pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    /// Echoed back when supplied on the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Echoed back when supplied on the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Build the result envelope. `offset` and `limit` are the user-supplied
/// values, echoed back verbatim; pagination itself has already happened.
pub fn result_to_json(
    result: &QueryResult,
    offset: Option<usize>,
    limit: Option<usize>,
) -> ResultEnvelope {
    let results = result
        .bindings
        .iter()
        .map(|binding| {
            let mut object = serde_json::Map::with_capacity(result.variables.len());
            for variable in &result.variables {
                if let Some(value) = binding.get(variable) {
                    object.insert(variable.clone(), serde_json::Value::String(value.clone()));
                }
            }
            object
        })
        .collect::<Vec<_>>();

    ResultEnvelope {
        variables: result.variables.clone(),
        count: results.len(),
        results,
        total: result.total,
        offset,
        limit,
    }
}
