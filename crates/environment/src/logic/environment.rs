use serde::{Deserialize, Serialize};
use shared::{error::CommonError, primitives::WrappedChronoDateTime};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::logic::finish_transaction;
use crate::logic::value::{KeyValue, Value, validate_key_value, validate_key_values};
use crate::repository::{
    CreateEnvironment, CreateValue, EnvironmentRepositoryLike, RepositoryLike, UpsertValue,
    ValueRepositoryLike,
};

// Domain model for Environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Environment {
    pub id: i64,
    pub name: String,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

/// An environment together with its values, in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EnvironmentWithValues {
    pub id: i64,
    pub name: String,
    pub values: Vec<Value>,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

impl EnvironmentWithValues {
    pub fn new(environment: Environment, values: Vec<Value>) -> Self {
        Self {
            id: environment.id,
            name: environment.name,
            values,
            created_at: environment.created_at,
            updated_at: environment.updated_at,
        }
    }
}

// Request/Response types
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateEnvironmentRequest {
    pub name: String,
    #[serde(default)]
    pub values: Vec<KeyValue>,
}

pub type CreateEnvironmentResponse = EnvironmentWithValues;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateEnvironmentRequest {
    /// Optional. When set to a non-zero id it must match the environment being updated.
    #[serde(default)]
    pub environment_id: Option<i64>,
    #[serde(default)]
    pub values: Vec<KeyValue>,
}

pub type UpdateEnvironmentResponse = ();

pub type GetEnvironmentResponse = EnvironmentWithValues;

pub type ListEnvironmentsResponse = Vec<EnvironmentWithValues>;

pub type DeleteEnvironmentResponse = ();

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEnvironmentsParams {
    /// Exact environment name to filter by
    #[serde(default)]
    pub name: Option<String>,
}

fn validate_name(name: &str) -> Result<String, CommonError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommonError::invalid_request(
            "environment name must not be empty",
        ));
    }
    Ok(name.to_string())
}

async fn load_with_values<T>(
    tx: &T,
    environment: Environment,
) -> Result<EnvironmentWithValues, CommonError>
where
    T: ValueRepositoryLike,
{
    let values = tx.get_values_by_environment_id(environment.id).await?;
    Ok(EnvironmentWithValues::new(environment, values))
}

async fn collect_environments<T>(
    tx: &T,
    name: Option<&str>,
) -> Result<ListEnvironmentsResponse, CommonError>
where
    T: EnvironmentRepositoryLike + ValueRepositoryLike,
{
    let environments = match name {
        Some(name) => vec![tx.get_environment_by_name(name).await?],
        None => tx.get_environments().await?,
    };

    let mut result = Vec::with_capacity(environments.len());
    for environment in environments {
        result.push(load_with_values(tx, environment).await?);
    }
    Ok(result)
}

/// Lists every environment with its values, or only the one named in `params`.
///
/// A name filter that matches nothing is reported as `NotFound`.
pub async fn list_environments<R: RepositoryLike>(
    repository: &R,
    params: ListEnvironmentsParams,
) -> Result<ListEnvironmentsResponse, CommonError> {
    let name = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let tx = repository.begin().await?;
    let result = collect_environments(&tx, name).await;
    finish_transaction(tx, result).await
}

async fn insert_environment<T>(
    tx: &T,
    name: String,
    values: Vec<KeyValue>,
) -> Result<EnvironmentWithValues, CommonError>
where
    T: EnvironmentRepositoryLike + ValueRepositoryLike,
{
    let now = WrappedChronoDateTime::now();
    let environment = tx
        .create_environment(&CreateEnvironment {
            name,
            created_at: now,
        })
        .await?;

    let mut created = Vec::with_capacity(values.len());
    for kv in values {
        let value = tx
            .create_value(&CreateValue {
                environment_id: environment.id,
                key: kv.key,
                value: kv.value,
                created_at: now,
            })
            .await?;
        created.push(value);
    }

    Ok(EnvironmentWithValues::new(environment, created))
}

/// Creates an environment and its initial values atomically.
pub async fn create_environment<R: RepositoryLike>(
    repository: &R,
    request: CreateEnvironmentRequest,
) -> Result<CreateEnvironmentResponse, CommonError> {
    let name = validate_name(&request.name)?;
    validate_key_values(&request.values)?;

    let tx = repository.begin().await?;
    let result = insert_environment(&tx, name, request.values).await;
    let created = finish_transaction(tx, result).await?;

    debug!(id = created.id, name = %created.name, "Created environment");
    Ok(created)
}

async fn fetch_environment<T>(tx: &T, id: i64) -> Result<EnvironmentWithValues, CommonError>
where
    T: EnvironmentRepositoryLike + ValueRepositoryLike,
{
    let environment = tx.get_environment_by_id(id).await?;
    load_with_values(tx, environment).await
}

pub async fn get_environment<R: RepositoryLike>(
    repository: &R,
    id: i64,
) -> Result<GetEnvironmentResponse, CommonError> {
    let tx = repository.begin().await?;
    let result = fetch_environment(&tx, id).await;
    finish_transaction(tx, result).await
}

async fn apply_values<T>(
    tx: &T,
    environment_id: i64,
    values: Vec<KeyValue>,
) -> Result<Vec<Value>, CommonError>
where
    T: EnvironmentRepositoryLike + ValueRepositoryLike,
{
    tx.get_environment_by_id(environment_id).await?;

    let now = WrappedChronoDateTime::now();
    let mut applied = Vec::with_capacity(values.len());
    for kv in values {
        let value = tx
            .upsert_value(&UpsertValue {
                environment_id,
                key: kv.key,
                value: kv.value,
                updated_at: now,
            })
            .await?;
        applied.push(value);
    }
    Ok(applied)
}

/// Sets each submitted key on the environment, inserting missing keys and
/// overwriting existing ones. Keys that are not submitted are left alone.
pub async fn update_environment<R: RepositoryLike>(
    repository: &R,
    id: i64,
    request: UpdateEnvironmentRequest,
) -> Result<UpdateEnvironmentResponse, CommonError> {
    // Ids start at 1, so zero means the caller left the field unset.
    if let Some(body_id) = request.environment_id.filter(|body_id| *body_id != 0) {
        if body_id != id {
            return Err(CommonError::invalid_request(format!(
                "environment_id {body_id} in body does not match environment {id} in path"
            )));
        }
    }
    for kv in &request.values {
        validate_key_value(kv)?;
    }

    let tx = repository.begin().await?;
    let result = apply_values(&tx, id, request.values).await;
    let applied = finish_transaction(tx, result).await?;

    debug!(id, count = applied.len(), "Updated environment values");
    Ok(())
}

/// Deletes an environment and every value it owns.
pub async fn delete_environment<R: RepositoryLike>(
    repository: &R,
    id: i64,
) -> Result<DeleteEnvironmentResponse, CommonError> {
    repository.delete_environment(id).await?;
    debug!(id, "Deleted environment");
    Ok(())
}
