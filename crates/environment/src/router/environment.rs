//! Environment HTTP endpoints

use axum::extract::{
    Json, Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
};
use axum::http::StatusCode;
use shared::adapters::openapi::{API_VERSION_TAG, Envelope};
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    logic::{
        environment::{
            CreateEnvironmentRequest, CreateEnvironmentResponse, DeleteEnvironmentResponse,
            EnvironmentWithValues, GetEnvironmentResponse, ListEnvironmentsParams,
            ListEnvironmentsResponse, UpdateEnvironmentRequest, UpdateEnvironmentResponse,
            create_environment, delete_environment, get_environment, list_environments,
            update_environment,
        },
        value::{DeleteValueResponse, delete_value},
    },
    service::EnvironmentService,
};
use shared::{adapters::openapi::JsonResponse, error::CommonError};

pub const SERVICE_ROUTE_KEY: &str = "env";

/// Create the environment router
pub fn create_router() -> OpenApiRouter<Arc<EnvironmentService>> {
    OpenApiRouter::new()
        .routes(routes!(route_list_environments))
        .routes(routes!(route_create_environment))
        .routes(routes!(route_get_environment))
        .routes(routes!(route_update_environment))
        .routes(routes!(route_delete_environment))
        .routes(routes!(route_delete_value))
}

/// Extractor failures are reported through the same envelope as every other error.
fn rejected(rejection: impl std::fmt::Display) -> CommonError {
    CommonError::invalid_request(rejection.to_string())
}

#[utoipa::path(
    get,
    path = "/env",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ListEnvironmentsParams
    ),
    responses(
        (status = 200, description = "List environments", body = Envelope<Vec<EnvironmentWithValues>>),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "No environment with the given name", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List environments",
    description = "List every environment with its values, or only the one matching `name`",
    operation_id = "list-environments",
)]
async fn route_list_environments(
    State(ctx): State<Arc<EnvironmentService>>,
    query: Result<Query<ListEnvironmentsParams>, QueryRejection>,
) -> JsonResponse<ListEnvironmentsResponse, CommonError> {
    let res = match query {
        Ok(Query(params)) => {
            trace!(name = ?params.name, "Listing environments");
            list_environments(&ctx.repository, params).await
        }
        Err(rejection) => Err(rejected(rejection)),
    };
    trace!(success = res.is_ok(), "Listing environments completed");
    JsonResponse::from_result(res, "Environments retrieved")
}

#[utoipa::path(
    post,
    path = "/env",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    request_body = CreateEnvironmentRequest,
    responses(
        (status = 201, description = "Create an environment", body = Envelope<EnvironmentWithValues>),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 409, description = "Environment name or key already exists", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Create environment",
    description = "Create a new environment together with its initial values",
    operation_id = "create-environment",
)]
async fn route_create_environment(
    State(ctx): State<Arc<EnvironmentService>>,
    payload: Result<Json<CreateEnvironmentRequest>, JsonRejection>,
) -> JsonResponse<CreateEnvironmentResponse, CommonError> {
    let res = match payload {
        Ok(Json(request)) => {
            trace!(name = %request.name, values = request.values.len(), "Creating environment");
            create_environment(&ctx.repository, request).await
        }
        Err(rejection) => Err(rejected(rejection)),
    };
    trace!(success = res.is_ok(), "Creating environment completed");
    JsonResponse::from_result(res, "Environment created").with_status(StatusCode::CREATED)
}

#[utoipa::path(
    get,
    path = "/env/{id}",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("id" = i64, Path, description = "Environment ID"),
    ),
    responses(
        (status = 200, description = "Get environment by id", body = Envelope<EnvironmentWithValues>),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Get environment",
    description = "Retrieve an environment and its values by id",
    operation_id = "get-environment",
)]
async fn route_get_environment(
    State(ctx): State<Arc<EnvironmentService>>,
    path: Result<Path<i64>, PathRejection>,
) -> JsonResponse<GetEnvironmentResponse, CommonError> {
    let res = match path {
        Ok(Path(id)) => {
            trace!(id, "Getting environment");
            get_environment(&ctx.repository, id).await
        }
        Err(rejection) => Err(rejected(rejection)),
    };
    trace!(success = res.is_ok(), "Getting environment completed");
    JsonResponse::from_result(res, "Environment retrieved")
}

#[utoipa::path(
    put,
    path = "/env/{id}",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("id" = i64, Path, description = "Environment ID"),
    ),
    request_body = UpdateEnvironmentRequest,
    responses(
        (status = 200, description = "Values inserted or overwritten; data is null"),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Update environment",
    description = "Insert or overwrite the submitted keys of an environment. Keys not submitted are kept.",
    operation_id = "update-environment",
)]
async fn route_update_environment(
    State(ctx): State<Arc<EnvironmentService>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateEnvironmentRequest>, JsonRejection>,
) -> JsonResponse<UpdateEnvironmentResponse, CommonError> {
    let res = match (path, payload) {
        (Ok(Path(id)), Ok(Json(request))) => {
            trace!(id, values = request.values.len(), "Updating environment");
            update_environment(&ctx.repository, id, request).await
        }
        (Err(rejection), _) => Err(rejected(rejection)),
        (_, Err(rejection)) => Err(rejected(rejection)),
    };
    trace!(success = res.is_ok(), "Updating environment completed");
    JsonResponse::from_result(res, "Environment updated")
}

#[utoipa::path(
    delete,
    path = "/env/{id}",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("id" = i64, Path, description = "Environment ID"),
    ),
    responses(
        (status = 200, description = "Environment and its values deleted; data is null"),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Delete environment",
    description = "Delete an environment together with all of its values",
    operation_id = "delete-environment",
)]
async fn route_delete_environment(
    State(ctx): State<Arc<EnvironmentService>>,
    path: Result<Path<i64>, PathRejection>,
) -> JsonResponse<DeleteEnvironmentResponse, CommonError> {
    let res = match path {
        Ok(Path(id)) => {
            trace!(id, "Deleting environment");
            delete_environment(&ctx.repository, id).await
        }
        Err(rejection) => Err(rejected(rejection)),
    };
    trace!(success = res.is_ok(), "Deleting environment completed");
    JsonResponse::from_result(res, "Environment deleted")
}

#[utoipa::path(
    delete,
    path = "/env/{id}/value/{value_id}",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("id" = i64, Path, description = "Environment ID"),
        ("value_id" = i64, Path, description = "Value ID"),
    ),
    responses(
        (status = 200, description = "Value deleted; data is null"),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 404, description = "Not Found", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Delete value",
    description = "Delete a single value of an environment",
    operation_id = "delete-value",
)]
async fn route_delete_value(
    State(ctx): State<Arc<EnvironmentService>>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> JsonResponse<DeleteValueResponse, CommonError> {
    let res = match path {
        Ok(Path((id, value_id))) => {
            trace!(id, value_id, "Deleting value");
            delete_value(&ctx.repository, id, value_id).await
        }
        Err(rejection) => Err(rejected(rejection)),
    };
    trace!(success = res.is_ok(), "Deleting value completed");
    JsonResponse::from_result(res, "Value deleted")
}
