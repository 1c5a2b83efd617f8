//! Repository layer for environment crate
//! Contains trait definitions for environment and value storage

pub mod sqlite;

use async_trait::async_trait;
use shared::{error::CommonError, primitives::WrappedChronoDateTime};

pub use sqlite::{Repository, RepositoryTransaction};

use crate::logic::{environment::Environment, value::Value};

/// Parameters for creating a new environment
#[derive(Debug, Clone)]
pub struct CreateEnvironment {
    pub name: String,
    pub created_at: WrappedChronoDateTime,
}

/// Parameters for creating a new value
#[derive(Debug, Clone)]
pub struct CreateValue {
    pub environment_id: i64,
    pub key: String,
    pub value: String,
    pub created_at: WrappedChronoDateTime,
}

/// Parameters for updating an existing value
#[derive(Debug, Clone)]
pub struct UpdateValue {
    pub id: i64,
    pub value: String,
    pub updated_at: WrappedChronoDateTime,
}

/// Parameters for inserting or replacing the value stored under a key
#[derive(Debug, Clone)]
pub struct UpsertValue {
    pub environment_id: i64,
    pub key: String,
    pub value: String,
    pub updated_at: WrappedChronoDateTime,
}

/// Repository trait for environment operations
#[async_trait]
pub trait EnvironmentRepositoryLike: Send + Sync {
    /// Create a new environment. Fails with `Conflict` when the name is taken.
    async fn create_environment(
        &self,
        params: &CreateEnvironment,
    ) -> Result<Environment, CommonError>;

    /// Get an environment by ID
    async fn get_environment_by_id(&self, id: i64) -> Result<Environment, CommonError>;

    /// Get an environment by its exact name
    async fn get_environment_by_name(&self, name: &str) -> Result<Environment, CommonError>;

    /// List all environments in id order
    async fn get_environments(&self) -> Result<Vec<Environment>, CommonError>;

    /// Delete an environment together with every value it owns
    async fn delete_environment(&self, id: i64) -> Result<(), CommonError>;
}

/// Repository trait for value operations
#[async_trait]
pub trait ValueRepositoryLike: Send + Sync {
    /// Create a new value. Fails with `Conflict` when the key already exists in the environment.
    async fn create_value(&self, params: &CreateValue) -> Result<Value, CommonError>;

    /// Get a value by ID
    async fn get_value_by_id(&self, id: i64) -> Result<Value, CommonError>;

    /// Get a value by key within an environment
    async fn get_value_by_key(&self, environment_id: i64, key: &str)
    -> Result<Value, CommonError>;

    /// Replace the value text of an existing value
    async fn update_value(&self, params: &UpdateValue) -> Result<Value, CommonError>;

    /// Insert the key or overwrite its value in a single statement
    async fn upsert_value(&self, params: &UpsertValue) -> Result<Value, CommonError>;

    /// List the values of an environment in id order
    async fn get_values_by_environment_id(
        &self,
        environment_id: i64,
    ) -> Result<Vec<Value>, CommonError>;

    /// Delete a value by ID
    async fn delete_value(&self, id: i64) -> Result<(), CommonError>;

    /// Delete a value by ID, only if it belongs to the given environment
    async fn delete_value_in_environment(
        &self,
        environment_id: i64,
        id: i64,
    ) -> Result<(), CommonError>;
}

/// A unit of work over the store. Dropping it without committing rolls it back.
#[async_trait]
pub trait TransactionLike: Send + Sync + Sized {
    async fn commit(self) -> Result<(), CommonError>;

    async fn rollback(self) -> Result<(), CommonError>;
}

/// A store that can hand out transactions exposing the same operations.
#[async_trait]
pub trait RepositoryLike: EnvironmentRepositoryLike + ValueRepositoryLike {
    type Transaction: EnvironmentRepositoryLike + ValueRepositoryLike + TransactionLike;

    async fn begin(&self) -> Result<Self::Transaction, CommonError>;
}
