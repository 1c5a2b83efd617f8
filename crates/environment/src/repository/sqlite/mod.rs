//! SQLite repository implementation for environment crate

mod queries;
mod raw_impl;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use shared::{error::CommonError, libsql::Migrations, primitives::SqlMigrationLoader};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::logic::{environment::Environment, value::Value};
use crate::repository::{
    CreateEnvironment, CreateValue, EnvironmentRepositoryLike, RepositoryLike, TransactionLike,
    UpdateValue, UpsertValue, ValueRepositoryLike,
};

/// SQLite repository for environment data.
///
/// All statements go through one connection. The gate serializes plain calls
/// against open transactions so a transaction never observes foreign writes
/// half way through.
#[derive(Clone)]
pub struct Repository {
    conn: shared::libsql::Connection,
    gate: Arc<Mutex<()>>,
}

impl Repository {
    /// Create a new repository instance
    pub fn new(conn: shared::libsql::Connection) -> Self {
        Self {
            conn,
            gate: Arc::new(Mutex::new(())),
        }
    }
}

impl SqlMigrationLoader for Repository {
    fn load_sql_migrations() -> Migrations<'static> {
        BTreeMap::from([(
            "sqlite",
            BTreeMap::from([
                (
                    "20250601000000_environment.up.sql",
                    include_str!(concat!(
                        env!("CARGO_MANIFEST_DIR"),
                        "/dbs/environment/migrations/20250601000000_environment.up.sql"
                    )),
                ),
                (
                    "20250601000000_environment.down.sql",
                    include_str!(concat!(
                        env!("CARGO_MANIFEST_DIR"),
                        "/dbs/environment/migrations/20250601000000_environment.down.sql"
                    )),
                ),
            ]),
        )])
    }
}

/// An open transaction on the repository connection.
///
/// Holds the repository gate until it is committed, rolled back or dropped.
pub struct RepositoryTransaction {
    // Declared before the guard so the rollback on drop runs while the gate is still held.
    tx: libsql::Transaction,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl TransactionLike for RepositoryTransaction {
    async fn commit(self) -> Result<(), CommonError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), CommonError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl RepositoryLike for Repository {
    type Transaction = RepositoryTransaction;

    async fn begin(&self) -> Result<RepositoryTransaction, CommonError> {
        let guard = self.gate.clone().lock_owned().await;
        let tx = self.conn.transaction().await?;
        Ok(RepositoryTransaction { tx, _guard: guard })
    }
}

#[async_trait]
impl EnvironmentRepositoryLike for Repository {
    async fn create_environment(
        &self,
        params: &CreateEnvironment,
    ) -> Result<Environment, CommonError> {
        let _gate = self.gate.lock().await;
        queries::insert_environment(&self.conn, params).await
    }

    async fn get_environment_by_id(&self, id: i64) -> Result<Environment, CommonError> {
        let _gate = self.gate.lock().await;
        queries::get_environment_by_id(&self.conn, id).await
    }

    async fn get_environment_by_name(&self, name: &str) -> Result<Environment, CommonError> {
        let _gate = self.gate.lock().await;
        queries::get_environment_by_name(&self.conn, name).await
    }

    async fn get_environments(&self) -> Result<Vec<Environment>, CommonError> {
        let _gate = self.gate.lock().await;
        queries::get_environments(&self.conn).await
    }

    async fn delete_environment(&self, id: i64) -> Result<(), CommonError> {
        let _gate = self.gate.lock().await;
        let tx = self.conn.transaction().await?;
        match queries::delete_environment(&tx, id).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back environment delete");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ValueRepositoryLike for Repository {
    async fn create_value(&self, params: &CreateValue) -> Result<Value, CommonError> {
        let _gate = self.gate.lock().await;
        queries::insert_value(&self.conn, params).await
    }

    async fn get_value_by_id(&self, id: i64) -> Result<Value, CommonError> {
        let _gate = self.gate.lock().await;
        queries::get_value_by_id(&self.conn, id).await
    }

    async fn get_value_by_key(
        &self,
        environment_id: i64,
        key: &str,
    ) -> Result<Value, CommonError> {
        let _gate = self.gate.lock().await;
        queries::get_value_by_key(&self.conn, environment_id, key).await
    }

    async fn update_value(&self, params: &UpdateValue) -> Result<Value, CommonError> {
        let _gate = self.gate.lock().await;
        queries::update_value(&self.conn, params).await
    }

    async fn upsert_value(&self, params: &UpsertValue) -> Result<Value, CommonError> {
        let _gate = self.gate.lock().await;
        queries::upsert_value(&self.conn, params).await
    }

    async fn get_values_by_environment_id(
        &self,
        environment_id: i64,
    ) -> Result<Vec<Value>, CommonError> {
        let _gate = self.gate.lock().await;
        queries::get_values_by_environment_id(&self.conn, environment_id).await
    }

    async fn delete_value(&self, id: i64) -> Result<(), CommonError> {
        let _gate = self.gate.lock().await;
        queries::delete_value(&self.conn, id).await
    }

    async fn delete_value_in_environment(
        &self,
        environment_id: i64,
        id: i64,
    ) -> Result<(), CommonError> {
        let _gate = self.gate.lock().await;
        queries::delete_value_in_environment(&self.conn, environment_id, id).await
    }
}

#[async_trait]
impl EnvironmentRepositoryLike for RepositoryTransaction {
    async fn create_environment(
        &self,
        params: &CreateEnvironment,
    ) -> Result<Environment, CommonError> {
        queries::insert_environment(&self.tx, params).await
    }

    async fn get_environment_by_id(&self, id: i64) -> Result<Environment, CommonError> {
        queries::get_environment_by_id(&self.tx, id).await
    }

    async fn get_environment_by_name(&self, name: &str) -> Result<Environment, CommonError> {
        queries::get_environment_by_name(&self.tx, name).await
    }

    async fn get_environments(&self) -> Result<Vec<Environment>, CommonError> {
        queries::get_environments(&self.tx).await
    }

    async fn delete_environment(&self, id: i64) -> Result<(), CommonError> {
        queries::delete_environment(&self.tx, id).await
    }
}

#[async_trait]
impl ValueRepositoryLike for RepositoryTransaction {
    async fn create_value(&self, params: &CreateValue) -> Result<Value, CommonError> {
        queries::insert_value(&self.tx, params).await
    }

    async fn get_value_by_id(&self, id: i64) -> Result<Value, CommonError> {
        queries::get_value_by_id(&self.tx, id).await
    }

    async fn get_value_by_key(
        &self,
        environment_id: i64,
        key: &str,
    ) -> Result<Value, CommonError> {
        queries::get_value_by_key(&self.tx, environment_id, key).await
    }

    async fn update_value(&self, params: &UpdateValue) -> Result<Value, CommonError> {
        queries::update_value(&self.tx, params).await
    }

    async fn upsert_value(&self, params: &UpsertValue) -> Result<Value, CommonError> {
        queries::upsert_value(&self.tx, params).await
    }

    async fn get_values_by_environment_id(
        &self,
        environment_id: i64,
    ) -> Result<Vec<Value>, CommonError> {
        queries::get_values_by_environment_id(&self.tx, environment_id).await
    }

    async fn delete_value(&self, id: i64) -> Result<(), CommonError> {
        queries::delete_value(&self.tx, id).await
    }

    async fn delete_value_in_environment(
        &self,
        environment_id: i64,
        id: i64,
    ) -> Result<(), CommonError> {
        queries::delete_value_in_environment(&self.tx, environment_id, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::primitives::WrappedChronoDateTime;

    async fn setup_test_repository() -> Repository {
        let (_db, conn) = shared::test_utils::repository::setup_in_memory_database(vec![
            <Repository as SqlMigrationLoader>::load_sql_migrations(),
        ])
        .await
        .expect("Failed to setup test database");
        Repository::new(conn)
    }

    fn new_environment(name: &str) -> CreateEnvironment {
        CreateEnvironment {
            name: name.to_string(),
            created_at: WrappedChronoDateTime::now(),
        }
    }

    fn new_value(environment_id: i64, key: &str, value: &str) -> CreateValue {
        CreateValue {
            environment_id,
            key: key.to_string(),
            value: value.to_string(),
            created_at: WrappedChronoDateTime::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_environment() {
        let repo = setup_test_repository().await;

        let created = repo
            .create_environment(&new_environment("staging"))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert_eq!(created.name, "staging");

        let by_id = repo.get_environment_by_id(created.id).await.unwrap();
        assert_eq!(by_id, created);

        let by_name = repo.get_environment_by_name("staging").await.unwrap();
        assert_eq!(by_name, created);
    }

    #[tokio::test]
    async fn test_duplicate_environment_name_conflicts() {
        let repo = setup_test_repository().await;
        repo.create_environment(&new_environment("prod"))
            .await
            .unwrap();

        let err = repo
            .create_environment(&new_environment("prod"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommonError::Conflict { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_missing_environment_is_not_found() {
        let repo = setup_test_repository().await;

        let err = repo.get_environment_by_id(42).await.unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));

        let err = repo.get_environment_by_name("nope").await.unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));

        let err = repo.delete_environment(42).await.unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_environments_in_id_order() {
        let repo = setup_test_repository().await;
        assert!(repo.get_environments().await.unwrap().is_empty());

        let a = repo.create_environment(&new_environment("b")).await.unwrap();
        let b = repo.create_environment(&new_environment("a")).await.unwrap();

        let ids: Vec<i64> = repo
            .get_environments()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_value_lifecycle() {
        let repo = setup_test_repository().await;
        let env = repo.create_environment(&new_environment("dev")).await.unwrap();

        let created = repo
            .create_value(&new_value(env.id, "DB_HOST", "localhost"))
            .await
            .unwrap();
        assert_eq!(created.environment_id, env.id);

        let by_key = repo.get_value_by_key(env.id, "DB_HOST").await.unwrap();
        assert_eq!(by_key.id, created.id);

        let updated = repo
            .update_value(&UpdateValue {
                id: created.id,
                value: "db.internal".to_string(),
                updated_at: WrappedChronoDateTime::now(),
            })
            .await
            .unwrap();
        assert_eq!(updated.value, "db.internal");
        assert_eq!(updated.created_at, created.created_at);

        repo.delete_value(created.id).await.unwrap();
        let err = repo.get_value_by_id(created.id).await.unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));
        let err = repo.delete_value(created.id).await.unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_key_conflicts_within_environment_only() {
        let repo = setup_test_repository().await;
        let dev = repo.create_environment(&new_environment("dev")).await.unwrap();
        let prod = repo.create_environment(&new_environment("prod")).await.unwrap();

        repo.create_value(&new_value(dev.id, "KEY", "1")).await.unwrap();
        repo.create_value(&new_value(prod.id, "KEY", "2")).await.unwrap();

        let err = repo
            .create_value(&new_value(dev.id, "KEY", "3"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommonError::Conflict { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_value_for_missing_environment_is_rejected() {
        let repo = setup_test_repository().await;

        let err = repo
            .create_value(&new_value(99, "KEY", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() {
        let repo = setup_test_repository().await;
        let env = repo.create_environment(&new_environment("dev")).await.unwrap();

        let upsert = |value: &str| UpsertValue {
            environment_id: env.id,
            key: "TOKEN".to_string(),
            value: value.to_string(),
            updated_at: WrappedChronoDateTime::now(),
        };

        let first = repo.upsert_value(&upsert("one")).await.unwrap();
        let second = repo.upsert_value(&upsert("two")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.value, "two");
        assert_eq!(
            repo.get_values_by_environment_id(env.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_environment_removes_values() {
        let repo = setup_test_repository().await;
        let env = repo.create_environment(&new_environment("dev")).await.unwrap();
        let value = repo
            .create_value(&new_value(env.id, "A", "1"))
            .await
            .unwrap();

        repo.delete_environment(env.id).await.unwrap();

        assert!(matches!(
            repo.get_value_by_id(value.id).await.unwrap_err(),
            CommonError::NotFound { .. }
        ));
        assert!(
            repo.get_values_by_environment_id(env.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_delete_value_in_environment_checks_ownership() {
        let repo = setup_test_repository().await;
        let dev = repo.create_environment(&new_environment("dev")).await.unwrap();
        let prod = repo.create_environment(&new_environment("prod")).await.unwrap();
        let value = repo
            .create_value(&new_value(dev.id, "A", "1"))
            .await
            .unwrap();

        let err = repo
            .delete_value_in_environment(prod.id, value.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CommonError::NotFound { .. }));

        repo.delete_value_in_environment(dev.id, value.id)
            .await
            .unwrap();
        assert!(repo.get_values_by_environment_id(dev.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rolled_back_transaction_leaves_no_trace() {
        let repo = setup_test_repository().await;

        let tx = repo.begin().await.unwrap();
        let env = tx.create_environment(&new_environment("temp")).await.unwrap();
        tx.create_value(&new_value(env.id, "A", "1")).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(repo.get_environments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let repo = setup_test_repository().await;

        let tx = repo.begin().await.unwrap();
        let env = tx.create_environment(&new_environment("kept")).await.unwrap();
        tx.create_value(&new_value(env.id, "A", "1")).await.unwrap();
        tx.commit().await.unwrap();

        let values = repo.get_values_by_environment_id(env.id).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].key, "A");
    }
}
