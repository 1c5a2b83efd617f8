//! Statements backing the sqlite repository.
//!
//! Every function takes a plain `libsql::Connection` so the same code runs on
//! the shared connection and inside a `libsql::Transaction`.

use libsql::{Connection, Row, params::IntoParams};
use shared::error::CommonError;

use crate::logic::{environment::Environment, value::Value};
use crate::repository::{CreateEnvironment, CreateValue, UpdateValue, UpsertValue};

const ENVIRONMENT_COLUMNS: &str = "id, name, created_at, updated_at";
const VALUE_COLUMNS: &str = "id, environment_id, key, value, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "UNIQUE constraint failed";
const FOREIGN_KEY_VIOLATION: &str = "FOREIGN KEY constraint failed";

async fn query_one<T>(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Option<T>, CommonError>
where
    T: TryFrom<Row, Error = CommonError>,
{
    let mut rows = conn.query(sql, params).await?;
    match rows.next().await? {
        Some(row) => Ok(Some(T::try_from(row)?)),
        None => Ok(None),
    }
}

async fn query_all<T>(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Vec<T>, CommonError>
where
    T: TryFrom<Row, Error = CommonError>,
{
    let mut rows = conn.query(sql, params).await?;
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(T::try_from(row)?);
    }
    Ok(items)
}

/// Turns constraint failures raised by a write into domain errors.
fn map_write_error(error: CommonError, conflict_msg: impl FnOnce() -> String) -> CommonError {
    match error {
        CommonError::SqliteError { source } => {
            let detail = source.to_string();
            if detail.contains(UNIQUE_VIOLATION) {
                CommonError::Conflict {
                    msg: conflict_msg(),
                    source: Some(source.into()),
                }
            } else if detail.contains(FOREIGN_KEY_VIOLATION) {
                CommonError::NotFound {
                    msg: "referenced environment does not exist".to_string(),
                    lookup_id: String::new(),
                    source: Some(source.into()),
                }
            } else {
                CommonError::Repository {
                    msg: format!("write failed: {detail}"),
                    source: Some(source.into()),
                }
            }
        }
        other => other,
    }
}

fn missing_row(what: &str) -> CommonError {
    CommonError::Repository {
        msg: format!("{what} returned no row"),
        source: None,
    }
}

fn environment_not_found(id: i64) -> CommonError {
    CommonError::not_found(format!("environment {id} not found"), id)
}

fn value_not_found(id: i64) -> CommonError {
    CommonError::not_found(format!("value {id} not found"), id)
}

pub async fn insert_environment(
    conn: &Connection,
    params: &CreateEnvironment,
) -> Result<Environment, CommonError> {
    let sql = format!(
        "INSERT INTO environment (name, created_at, updated_at) VALUES (?1, ?2, ?2) RETURNING {ENVIRONMENT_COLUMNS}"
    );
    query_one(
        conn,
        &sql,
        libsql::params![params.name.clone(), params.created_at.to_rfc3339()],
    )
    .await
    .map_err(|e| {
        map_write_error(e, || {
            format!("environment with name '{}' already exists", params.name)
        })
    })?
    .ok_or_else(|| missing_row("insert environment"))
}

pub async fn get_environment_by_id(conn: &Connection, id: i64) -> Result<Environment, CommonError> {
    let sql = format!("SELECT {ENVIRONMENT_COLUMNS} FROM environment WHERE id = ?1");
    query_one(conn, &sql, libsql::params![id])
        .await?
        .ok_or_else(|| environment_not_found(id))
}

pub async fn get_environment_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Environment, CommonError> {
    let sql = format!("SELECT {ENVIRONMENT_COLUMNS} FROM environment WHERE name = ?1");
    query_one(conn, &sql, libsql::params![name.to_string()])
        .await?
        .ok_or_else(|| CommonError::not_found(format!("environment '{name}' not found"), name))
}

pub async fn get_environments(conn: &Connection) -> Result<Vec<Environment>, CommonError> {
    let sql = format!("SELECT {ENVIRONMENT_COLUMNS} FROM environment ORDER BY id ASC");
    query_all(conn, &sql, ()).await
}

/// Removes the environment's values, then the environment itself.
/// Callers run this inside a transaction.
pub async fn delete_environment(conn: &Connection, id: i64) -> Result<(), CommonError> {
    conn.execute(
        "DELETE FROM value WHERE environment_id = ?1",
        libsql::params![id],
    )
    .await?;
    let deleted = conn
        .execute("DELETE FROM environment WHERE id = ?1", libsql::params![id])
        .await?;
    if deleted == 0 {
        return Err(environment_not_found(id));
    }
    Ok(())
}

pub async fn insert_value(conn: &Connection, params: &CreateValue) -> Result<Value, CommonError> {
    let sql = format!(
        "INSERT INTO value (environment_id, key, value, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4) RETURNING {VALUE_COLUMNS}"
    );
    query_one(
        conn,
        &sql,
        libsql::params![
            params.environment_id,
            params.key.clone(),
            params.value.clone(),
            params.created_at.to_rfc3339()
        ],
    )
    .await
    .map_err(|e| {
        map_write_error(e, || {
            format!(
                "key '{}' already exists in environment {}",
                params.key, params.environment_id
            )
        })
    })?
    .ok_or_else(|| missing_row("insert value"))
}

pub async fn get_value_by_id(conn: &Connection, id: i64) -> Result<Value, CommonError> {
    let sql = format!("SELECT {VALUE_COLUMNS} FROM value WHERE id = ?1");
    query_one(conn, &sql, libsql::params![id])
        .await?
        .ok_or_else(|| value_not_found(id))
}

pub async fn get_value_by_key(
    conn: &Connection,
    environment_id: i64,
    key: &str,
) -> Result<Value, CommonError> {
    let sql = format!("SELECT {VALUE_COLUMNS} FROM value WHERE environment_id = ?1 AND key = ?2");
    query_one(conn, &sql, libsql::params![environment_id, key.to_string()])
        .await?
        .ok_or_else(|| {
            CommonError::not_found(
                format!("key '{key}' not found in environment {environment_id}"),
                key,
            )
        })
}

pub async fn update_value(conn: &Connection, params: &UpdateValue) -> Result<Value, CommonError> {
    let sql = format!(
        "UPDATE value SET value = ?1, updated_at = ?2 WHERE id = ?3 RETURNING {VALUE_COLUMNS}"
    );
    query_one(
        conn,
        &sql,
        libsql::params![
            params.value.clone(),
            params.updated_at.to_rfc3339(),
            params.id
        ],
    )
    .await?
    .ok_or_else(|| value_not_found(params.id))
}

/// One statement, so two concurrent upserts of the same key can never both insert.
pub async fn upsert_value(conn: &Connection, params: &UpsertValue) -> Result<Value, CommonError> {
    let sql = format!(
        "INSERT INTO value (environment_id, key, value, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4) \
         ON CONFLICT (environment_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at \
         RETURNING {VALUE_COLUMNS}"
    );
    query_one(
        conn,
        &sql,
        libsql::params![
            params.environment_id,
            params.key.clone(),
            params.value.clone(),
            params.updated_at.to_rfc3339()
        ],
    )
    .await
    .map_err(|e| map_write_error(e, || format!("key '{}' could not be written", params.key)))?
    .ok_or_else(|| missing_row("upsert value"))
}

pub async fn get_values_by_environment_id(
    conn: &Connection,
    environment_id: i64,
) -> Result<Vec<Value>, CommonError> {
    let sql = format!("SELECT {VALUE_COLUMNS} FROM value WHERE environment_id = ?1 ORDER BY id ASC");
    query_all(conn, &sql, libsql::params![environment_id]).await
}

pub async fn delete_value(conn: &Connection, id: i64) -> Result<(), CommonError> {
    let deleted = conn
        .execute("DELETE FROM value WHERE id = ?1", libsql::params![id])
        .await?;
    if deleted == 0 {
        return Err(value_not_found(id));
    }
    Ok(())
}

pub async fn delete_value_in_environment(
    conn: &Connection,
    environment_id: i64,
    id: i64,
) -> Result<(), CommonError> {
    let deleted = conn
        .execute(
            "DELETE FROM value WHERE id = ?1 AND environment_id = ?2",
            libsql::params![id, environment_id],
        )
        .await?;
    if deleted == 0 {
        return Err(CommonError::not_found(
            format!("value {id} not found in environment {environment_id}"),
            id,
        ));
    }
    Ok(())
}
