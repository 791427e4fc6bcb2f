//! `OpenAPI` Specification
//!
//! Documentation for the query surface, served by Swagger UI at
//! `/api/docs`.

use utoipa::OpenApi;

use super::dto::{
    PredicateFactsDto, PredicateInfoDto, PredicatesDto, QueryRequest, VersionDto,
};
use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BeingDB API",
        description = "Conjunctive queries over an immutable fact-pack snapshot",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0"
        )
    ),
    paths(
        handlers::health,
        handlers::version,
        handlers::predicates,
        handlers::predicate_facts,
        handlers::query,
    ),
    components(schemas(
        QueryRequest,
        VersionDto,
        PredicateInfoDto,
        PredicatesDto,
        PredicateFactsDto,
    )),
    tags(
        (name = "admin", description = "Liveness and identity"),
        (name = "queries", description = "Fact lookup and conjunctive queries"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["paths"]["/query"].is_object());
        assert!(json["paths"]["/predicates"].is_object());
    }
}
