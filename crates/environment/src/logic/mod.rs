//! Business logic layer for environment crate
//! Contains domain models and CRUD operations for environments and their values

pub mod environment;
pub mod value;

use shared::error::CommonError;
use tracing::warn;

use crate::repository::TransactionLike;

/// Commits `tx` when `result` is ok, otherwise rolls it back and passes the error through.
pub(crate) async fn finish_transaction<T, X: TransactionLike>(
    tx: X,
    result: Result<T, CommonError>,
) -> Result<T, CommonError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use shared::primitives::SqlMigrationLoader;

    use crate::repository::Repository;

    pub async fn setup_test_repository() -> Repository {
        let (_db, conn) = shared::test_utils::repository::setup_in_memory_database(vec![
            <Repository as SqlMigrationLoader>::load_sql_migrations(),
        ])
        .await
        .expect("Failed to setup test database");
        Repository::new(conn)
    }
}
