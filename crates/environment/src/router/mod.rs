//! Router layer for environment crate
//! Contains HTTP endpoints for environments and their values

pub mod environment;

use std::sync::Arc;

use axum::{Json, Router, http::Uri, routing::get};
use shared::error::CommonError;
use utoipa::openapi::{InfoBuilder, OpenApi as OpenApiDoc, OpenApiBuilder, Server};
use utoipa_axum::router::OpenApiRouter;

use crate::service::EnvironmentService;

/// Create the combined environment router
pub fn create_router() -> OpenApiRouter<Arc<EnvironmentService>> {
    let doc = OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("envhub")
                .version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
        .build();

    OpenApiRouter::with_openapi(doc).merge(environment::create_router())
}

/// Get the combined OpenAPI spec for the environment crate
pub fn get_openapi_spec() -> OpenApiDoc {
    let (_, spec) = create_router().split_for_parts();
    spec
}

/// `"/api/v1/"` becomes `"/api/v1"`; `""` and `"/"` become `""`.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

async fn route_not_found(uri: Uri) -> CommonError {
    CommonError::not_found(format!("no route for {}", uri.path()), uri.path())
}

/// Builds the HTTP application: every endpoint plus `/openapi.json`, mounted under `base_path`.
pub fn initiate_api_router(service: EnvironmentService, base_path: &str) -> Router {
    let base_path = normalize_base_path(base_path);

    let (router, mut spec) = create_router().split_for_parts();
    spec.servers = Some(vec![Server::new(if base_path.is_empty() {
        "/"
    } else {
        base_path.as_str()
    })]);

    let router = router
        .route(
            "/openapi.json",
            get(move || std::future::ready(Json(spec.clone()))),
        )
        .with_state(Arc::new(service));

    // axum refuses to nest at the root
    let router = if base_path.is_empty() {
        Router::new().merge(router)
    } else {
        Router::new().nest(&base_path, router)
    };

    router.fallback(route_not_found)
}
