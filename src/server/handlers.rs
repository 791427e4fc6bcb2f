//! Request Handlers
//!
//! Handlers for the query surface. A request moves through parse,
//! validation and optimization before anything executes; execution itself
//! runs on the blocking pool with the deadline and cap guards polled
//! between iterations, and a drop guard cancels the in-flight query when
//! the client goes away.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::Path, Extension, Json};

use super::dto::{
    PredicateFactsDto, PredicateInfoDto, PredicatesDto, QueryRequest, VersionDto,
};
use super::error::ApiError;
use super::ServerState;
use crate::engine::safety::is_valid_predicate_name;
use crate::engine::{result_to_json, validate_query, ResultEnvelope};
use crate::execution::{CancelHandle, QueryTimeout};
use crate::parser::parse_query;

/// Liveness probe
#[utoipa::path(
    get,
    path = "/",
    tag = "admin",
    responses((status = 200, description = "Server is up", body = String))
)]
pub async fn health() -> &'static str {
    "OK"
}

/// Server name and version
#[utoipa::path(
    get,
    path = "/version",
    tag = "admin",
    responses((status = 200, description = "Server identity", body = VersionDto))
)]
pub async fn version() -> Json<VersionDto> {
    Json(VersionDto {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List predicates with their arities
#[utoipa::path(
    get,
    path = "/predicates",
    tag = "queries",
    responses((status = 200, description = "Predicates in the served snapshot", body = PredicatesDto))
)]
pub async fn predicates(
    Extension(state): Extension<Arc<ServerState>>,
) -> Json<PredicatesDto> {
    let predicates = state
        .engine
        .list_predicates_with_arity()
        .into_iter()
        .map(|(name, arity)| PredicateInfoDto { name, arity })
        .collect();
    Json(PredicatesDto { predicates })
}

/// Enumerate all facts under one predicate (no pagination)
#[utoipa::path(
    get,
    path = "/query/{predicate}",
    tag = "queries",
    params(("predicate" = String, Path, description = "Predicate name ([a-z0-9_]+)")),
    responses(
        (status = 200, description = "All facts under the predicate", body = PredicateFactsDto),
        (status = 400, description = "Invalid predicate name"),
        (status = 503, description = "Server overloaded"),
    )
)]
pub async fn predicate_facts(
    Extension(state): Extension<Arc<ServerState>>,
    Path(predicate): Path<String>,
) -> Result<Json<PredicateFactsDto>, ApiError> {
    if !is_valid_predicate_name(&predicate) {
        return Err(ApiError::bad_request(format!(
            "invalid predicate name: {predicate:?} (expected [a-z0-9_]+)"
        )));
    }

    let _permit = state.admit()?;

    let worker_state = Arc::clone(&state);
    let name = predicate.clone();
    let facts = tokio::task::spawn_blocking(move || {
        worker_state
            .engine
            .query_all(&name)
            .into_iter()
            .map(|fact| fact.into_iter().map(|arg| arg.into_text()).collect())
            .collect::<Vec<Vec<String>>>()
    })
    .await
    .map_err(|e| ApiError::internal(format!("query task failed: {e}")))?;

    Ok(Json(PredicateFactsDto { predicate, facts }))
}

/// Execute a conjunctive query
#[utoipa::path(
    post,
    path = "/query",
    tag = "queries",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Result envelope: variables, results, count, total?, offset?, limit?"),
        (status = 400, description = "Invalid query, or execution guard tripped"),
        (status = 503, description = "Server overloaded"),
    )
)]
pub async fn query(
    Extension(state): Extension<Arc<ServerState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let _permit = state.admit()?;

    let Some(parsed) = parse_query(&request.query) else {
        return Err(ApiError::bad_request("invalid query syntax"));
    };
    validate_query(&parsed, request.offset, request.limit)?;

    let offset = request.offset.map(|o| o as usize);
    let limit = request.limit.map(|l| l as usize);
    let effective_limit = limit.unwrap_or(state.max_results).min(state.max_results);

    // Pagination on a multi-pattern query takes the bounded-memory
    // streaming path; everything else materializes and reports a total.
    let streaming = (offset.is_some() || limit.is_some()) && parsed.patterns.len() > 1;

    let guard = QueryTimeout::new(state.engine.config().timeout);
    let cancel_on_drop = CancelOnDrop::new(guard.cancel_handle());

    let started = Instant::now();
    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        if streaming {
            worker_state
                .engine
                .execute_streaming_with(&parsed, offset.unwrap_or(0), effective_limit, &guard)
        } else {
            worker_state.engine.execute_with(&parsed, &guard).map(|mut result| {
                result.paginate(offset.unwrap_or(0), effective_limit);
                result
            })
        }
    })
    .await
    .map_err(|e| ApiError::internal(format!("query task failed: {e}")))?;

    cancel_on_drop.disarm();
    let result = result?;

    tracing::debug!(
        query = %request.query,
        streaming,
        results = result.bindings.len(),
        elapsed = ?started.elapsed(),
        "query completed"
    );

    Ok(Json(result_to_json(&result, offset, limit)))
}

/// Cancels the associated query unless disarmed; the handler future being
/// dropped (client disconnect) is what arms the cancellation.
struct CancelOnDrop {
    handle: CancelHandle,
    armed: bool,
}

impl CancelOnDrop {
    fn new(handle: CancelHandle) -> Self {
        CancelOnDrop { handle, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pack::Pack;
    use std::fs;
    use tempfile::TempDir;

    fn make_state_with(
        sources: &[(&str, &str)],
        config: Config,
    ) -> (Arc<ServerState>, TempDir) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let pack_dir = temp.path().join("pack");
        fs::create_dir_all(&source).unwrap();
        for (name, contents) in sources {
            fs::write(source.join(format!("{name}.pl")), contents).unwrap();
        }
        crate::compile::compile(&source, &pack_dir).unwrap();

        let pack = Arc::new(Pack::open(&pack_dir).unwrap());
        (Arc::new(ServerState::new(pack, &config)), temp)
    }

    fn make_state(sources: &[(&str, &str)], max_concurrent: usize) -> (Arc<ServerState>, TempDir) {
        let mut config = Config::default();
        config.server.max_concurrent = max_concurrent;
        make_state_with(sources, config)
    }

    fn request(query: &str, offset: Option<i64>, limit: Option<i64>) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            offset,
            limit,
        }
    }

    #[tokio::test]
    async fn test_query_basic() {
        let (state, _t) = make_state(
            &[("created", "created(tina_keane, she).\ncreated(tina_keane, faded_wallpaper).\n")],
            20,
        );
        let response = query(
            Extension(state),
            Json(request("created(tina_keane, Work)", None, None)),
        )
        .await
        .unwrap();
        let envelope = response.0;
        assert_eq!(envelope.variables, vec!["Work"]);
        assert_eq!(envelope.count, 2);
        assert_eq!(envelope.total, Some(2));
    }

    #[tokio::test]
    async fn test_query_syntax_error_is_400() {
        let (state, _t) = make_state(&[("a", "a(1).\n")], 20);
        let err = query(Extension(state), Json(request("no parens", None, None)))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_cartesian_rejected_before_execution() {
        let (state, _t) = make_state(&[("created", "created(a, b).\n")], 20);
        let err = query(
            Extension(state),
            Json(request("created(A, W), created(A, W)", None, None)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("Cartesian"));
    }

    #[tokio::test]
    async fn test_single_pattern_pagination_reports_total() {
        let source: String = (1..=10).map(|i| format!("data({i}).\n")).collect();
        let (state, _t) = make_state(&[("data", &source)], 20);
        let response = query(
            Extension(state),
            Json(request("data(X)", Some(5), Some(100))),
        )
        .await
        .unwrap();
        let envelope = response.0;
        assert_eq!(envelope.count, 5);
        assert_eq!(envelope.total, Some(10));
        assert_eq!(envelope.offset, Some(5));
        assert_eq!(envelope.limit, Some(100));
        let values: Vec<&str> = envelope
            .results
            .iter()
            .map(|b| b["X"].as_str().unwrap())
            .collect();
        assert_eq!(values, vec!["6", "7", "8", "9", "10"]);
    }

    #[tokio::test]
    async fn test_multi_pattern_pagination_omits_total() {
        let (state, _t) = make_state(
            &[
                ("a", "a(1).\na(2).\na(3).\n"),
                ("b", "b(1).\nb(2).\nb(3).\n"),
            ],
            20,
        );
        let response = query(
            Extension(state),
            Json(request("a(X), b(Y)", Some(0), Some(4))),
        )
        .await
        .unwrap();
        let envelope = response.0;
        assert_eq!(envelope.count, 4);
        assert!(envelope.total.is_none());
    }

    #[tokio::test]
    async fn test_server_ceiling_caps_results() {
        let source: String = (1..=10).map(|i| format!("data({i}).\n")).collect();
        let mut config = Config::default();
        config.server.max_results = 3;
        let (state, _t) = make_state_with(&[("data", &source)], config);
        let response = query(Extension(state), Json(request("data(X)", None, None)))
            .await
            .unwrap();
        let envelope = response.0;
        assert_eq!(envelope.count, 3);
        assert_eq!(envelope.total, Some(10));
    }

    #[tokio::test]
    async fn test_user_limit_cannot_exceed_ceiling() {
        let source: String = (1..=10).map(|i| format!("data({i}).\n")).collect();
        let mut config = Config::default();
        config.server.max_results = 4;
        let (state, _t) = make_state_with(&[("data", &source)], config);
        let response = query(Extension(state), Json(request("data(X)", None, Some(100))))
            .await
            .unwrap();
        assert_eq!(response.0.count, 4);
        assert_eq!(response.0.limit, Some(100));
    }

    #[tokio::test]
    async fn test_predicate_facts() {
        let (state, _t) = make_state(&[("edge", "edge(a, b).\nedge(b, c).\n")], 20);
        let response = predicate_facts(Extension(state), Path("edge".to_string()))
            .await
            .unwrap();
        let dto = response.0;
        assert_eq!(dto.predicate, "edge");
        assert_eq!(dto.facts.len(), 2);
    }

    #[tokio::test]
    async fn test_predicate_facts_invalid_name() {
        let (state, _t) = make_state(&[("edge", "edge(a, b).\n")], 20);
        let err = predicate_facts(Extension(state), Path("No-Good".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admission_gate_full_is_503() {
        let (state, _t) = make_state(&[("a", "a(1).\n")], 1);
        let _held = state.admit().unwrap();
        let err = query(Extension(Arc::clone(&state)), Json(request("a(X)", None, None)))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_version_reports_crate_identity() {
        let response = version().await;
        assert_eq!(response.0.name, "beingdb");
        assert!(!response.0.version.is_empty());
    }
}
