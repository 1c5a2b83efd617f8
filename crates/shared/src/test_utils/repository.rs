use std::path::Path;

use crate::error::CommonError;
use crate::libsql::{Connection, Migrations, merge_nested_migrations, run_migrations};

/// Opens a private in-memory database with foreign keys enabled and the given
/// migrations applied.
pub async fn setup_in_memory_database<'a>(
    migrations: Vec<Migrations<'a>>,
) -> Result<(libsql::Database, Connection), CommonError> {
    let db = libsql::Builder::new_local(":memory:").build().await?;
    let conn = Connection(db.connect()?);
    prepare(&conn, migrations).await?;
    Ok((db, conn))
}

/// Same as [`setup_in_memory_database`] but backed by a file, for tests that
/// need the database to outlive a single connection.
pub async fn setup_file_database<'a>(
    path: &Path,
    migrations: Vec<Migrations<'a>>,
) -> Result<(libsql::Database, Connection), CommonError> {
    let db = libsql::Builder::new_local(path).build().await?;
    let conn = Connection(db.connect()?);
    prepare(&conn, migrations).await?;
    Ok((db, conn))
}

async fn prepare<'a>(conn: &Connection, migrations: Vec<Migrations<'a>>) -> Result<(), CommonError> {
    // Enable foreign key constraints
    conn.execute("PRAGMA foreign_keys = ON", ()).await?;

    let migrations_to_run = merge_nested_migrations(migrations);
    run_migrations(conn, &migrations_to_run).await
}
