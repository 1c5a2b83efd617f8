use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::error::CommonError;
use libsql::params::IntoParams;
use libsql::{BatchRows, Database, Rows};
use tempfile::TempDir;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone)]
pub struct Connection(pub libsql::Connection);

impl Connection {
    pub fn new(connection: libsql::Connection) -> Self {
        Self(connection)
    }
}

impl Deref for Connection {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[macro_export]
macro_rules! execute_with_retry {
    ($operation:expr) => {
        execute_with_retry!($operation, 10)
    };
    ($operation:expr, $max_retries:expr) => {{
        async {
            let mut _retries = 0u32;
            let _max_retries: u32 = $max_retries;

            loop {
                match $operation.await {
                    Ok(result) => break Ok(result),
                    Err(err) => {
                        let err_str = err.to_string();
                        if err_str.contains("database is locked") || err_str.contains("SQLITE_BUSY")
                        {
                            tracing::warn!("Database is locked, retrying... {:?}", err);
                            if _retries >= _max_retries {
                                break Err(err);
                            }

                            _retries += 1;

                            let delay_us = 10_000 * (1 << _retries.min(6));
                            tokio::time::sleep(std::time::Duration::from_micros(delay_us)).await;
                        } else {
                            tracing::error!("Error executing with retry: {:?}", err);
                            break Err(err);
                        }
                    }
                }
            }
        }
        .await
    }};
}

impl Connection {
    /// Execute sql query provided some type that implements [`IntoParams`] returning
    /// on success the number of rows that were changed.
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> libsql::Result<u64> {
        tracing::trace!("executing `{}`", sql);
        let params = params.into_params()?;
        execute_with_retry!(self.0.execute(sql, params.clone()), 10)
    }

    /// Execute a batch set of statements.
    pub async fn execute_batch(&self, sql: &str) -> libsql::Result<BatchRows> {
        tracing::trace!("executing batch `{}`", sql);
        execute_with_retry!(self.0.execute_batch(sql), 10)
    }

    /// Execute sql query provided some type that implements [`IntoParams`] returning
    /// on success the [`Rows`].
    pub async fn query(&self, sql: &str, params: impl IntoParams) -> libsql::Result<Rows> {
        let stmt = self.prepare(sql).await?;
        let params = params.into_params()?;
        execute_with_retry!(stmt.query(params.clone()), 10)
    }

    /// Open a deferred transaction, retrying while another process holds the
    /// database lock.
    pub async fn transaction(&self) -> libsql::Result<libsql::Transaction> {
        tracing::trace!("beginning transaction");
        execute_with_retry!(self.0.transaction(), 10)
    }
}

pub struct LocalConnectionParams {
    pub path_to_db_file: PathBuf,
}

pub struct RemoteConnectionParams {
    pub remote_url: String,
    pub auth_token: String,
}

pub enum ConnectionType {
    Local(LocalConnectionParams),
    Remote(RemoteConnectionParams),
}

fn get_libsql_path(url: &Url) -> String {
    // `libsql://./foo.db` puts `.` in the host slot
    match url.host_str() {
        Some(".") => format!(".{}", url.path()),
        Some(host) if !host.is_empty() => format!("{host}{}", url.path()),
        _ => url.path().to_string(),
    }
}

impl TryFrom<Url> for ConnectionType {
    type Error = CommonError;
    fn try_from(url: Url) -> Result<Self, Self::Error> {
        if url.scheme() != "libsql" {
            let scheme = url.scheme();
            return Err(CommonError::Unknown(anyhow::anyhow!(
                "invalid scheme: {scheme}"
            )));
        }

        let mode = match url
            .query_pairs()
            .find(|(key, _)| key == "mode")
            .map(|(_, value)| value.to_string())
        {
            Some(mode) => mode,
            None => {
                return Err(CommonError::Unknown(anyhow::anyhow!(
                    "missing mode query parameter"
                )));
            }
        };

        match mode.as_str() {
            "local" => Ok(ConnectionType::Local(LocalConnectionParams {
                path_to_db_file: PathBuf::from(get_libsql_path(&url)),
            })),
            "remote" => {
                let auth_token = match url.query_pairs().find(|(key, _)| key == "auth") {
                    Some((_, value)) => value.to_string(),
                    None => {
                        return Err(CommonError::Unknown(anyhow::anyhow!(
                            "missing auth query parameter for remote database"
                        )));
                    }
                };

                let mut remote_url = url.clone();
                remote_url.set_query(None);

                Ok(ConnectionType::Remote(RemoteConnectionParams {
                    remote_url: remote_url.to_string(),
                    auth_token,
                }))
            }
            _ => Err(CommonError::Unknown(anyhow::anyhow!(
                "invalid mode: {mode}"
            ))),
        }
    }
}

pub fn inject_auth_token_to_db_url(
    url: &Url,
    auth_token: &Option<String>,
) -> Result<Url, CommonError> {
    let mut conn_url = url.clone();
    if let Some(auth_token) = auth_token {
        conn_url.query_pairs_mut().append_pair("auth", auth_token);
    }
    Ok(conn_url)
}

/// backend name -> (migration file name -> sql)
pub type Migrations<'a> = BTreeMap<&'a str, BTreeMap<&'a str, &'a str>>;

pub fn merge_nested_migrations<'a>(mergable_migrations: Vec<Migrations<'a>>) -> Migrations<'a> {
    let mut target = Migrations::new();
    for other in mergable_migrations {
        for (outer_key, inner_map) in other {
            target
                .entry(outer_key)
                .and_modify(|existing_inner| {
                    for (inner_key, value) in inner_map.iter() {
                        existing_inner.insert(*inner_key, *value);
                    }
                })
                .or_insert(inner_map);
        }
    }
    target
}

/// Applies every pending `*.up.sql` sqlite migration in file name order.
///
/// The embedded migrations are written to a scratch directory and handed to
/// `libsql_migration`, which records what it applied and skips it next time.
pub async fn run_migrations(
    conn: &libsql::Connection,
    migrations: &Migrations<'_>,
) -> Result<(), CommonError> {
    let Some(sqlite_migrations) = migrations.get("sqlite") else {
        return Ok(());
    };

    let up_migrations = sqlite_migrations
        .iter()
        .filter(|(name, _)| name.contains(".up."))
        .map(|(name, sql)| (*name, *sql))
        .collect::<BTreeMap<&str, &str>>();
    if up_migrations.is_empty() {
        return Ok(());
    }

    let dir = write_migrations_to_temp_dir(&up_migrations)?;
    debug!(count = up_migrations.len(), dir = %dir.path().display(), "running migrations");
    libsql_migration::dir::migrate(conn, dir.path().to_path_buf()).await?;
    info!(count = up_migrations.len(), "migrations up to date");

    Ok(())
}

fn write_migrations_to_temp_dir(migrations: &BTreeMap<&str, &str>) -> Result<TempDir, CommonError> {
    let dir = TempDir::new()?;
    for (name, sql) in migrations {
        std::fs::write(dir.path().join(name), sql)?;
    }
    Ok(dir)
}

fn create_db_file_parent_dir(parent_path: Option<&Path>) -> Result<(), CommonError> {
    if let Some(path) = parent_path {
        if !path.as_os_str().is_empty() && !std::fs::exists(path)? {
            std::fs::create_dir_all(path)?;
        }
    }
    Ok(())
}

pub async fn establish_db_connection<'a>(
    connection_string: &Url,
    migrations: Option<Migrations<'a>>,
) -> Result<(Database, Connection), CommonError> {
    let connection_type = ConnectionType::try_from(connection_string.clone())?;

    let (db, conn) = match connection_type {
        ConnectionType::Local(params) => {
            info!(path = %params.path_to_db_file.display(), "establishing local connection");
            create_db_file_parent_dir(params.path_to_db_file.parent())?;
            let db = libsql::Builder::new_local(params.path_to_db_file.clone())
                .build()
                .await?;
            let conn = db.connect()?;
            (db, conn)
        }
        ConnectionType::Remote(params) => {
            info!("establishing remote connection");
            let db =
                libsql::Builder::new_remote(params.remote_url.clone(), params.auth_token.clone())
                    .build()
                    .await?;
            let conn = db.connect()?;
            (db, conn)
        }
    };

    conn.execute("PRAGMA foreign_keys = ON", ()).await?;

    if let Some(migrations) = migrations {
        run_migrations(&conn, &migrations).await?;
    }

    Ok((db, Connection(conn)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_local_connection_string() {
        let url = Url::parse("libsql://./data/envhub.db?mode=local").unwrap();
        match ConnectionType::try_from(url).unwrap() {
            ConnectionType::Local(params) => {
                assert_eq!(params.path_to_db_file, PathBuf::from("./data/envhub.db"));
            }
            ConnectionType::Remote(_) => panic!("expected local connection"),
        }
    }

    #[test]
    fn parses_absolute_local_connection_string() {
        let url = Url::parse("libsql:///var/lib/envhub/local.db?mode=local").unwrap();
        match ConnectionType::try_from(url).unwrap() {
            ConnectionType::Local(params) => {
                assert_eq!(
                    params.path_to_db_file,
                    PathBuf::from("/var/lib/envhub/local.db")
                );
            }
            ConnectionType::Remote(_) => panic!("expected local connection"),
        }
    }

    #[test]
    fn remote_connection_requires_auth_token() {
        let url = Url::parse("libsql://db.example.com?mode=remote").unwrap();
        assert!(ConnectionType::try_from(url.clone()).is_err());

        let url = inject_auth_token_to_db_url(&url, &Some("token".to_string())).unwrap();
        match ConnectionType::try_from(url).unwrap() {
            ConnectionType::Remote(params) => {
                assert_eq!(params.auth_token, "token");
                assert!(!params.remote_url.contains("auth="));
            }
            ConnectionType::Local(_) => panic!("expected remote connection"),
        }
    }

    #[test]
    fn rejects_unknown_scheme_and_mode() {
        assert!(ConnectionType::try_from(Url::parse("sqlite://foo.db?mode=local").unwrap()).is_err());
        assert!(ConnectionType::try_from(Url::parse("libsql://./foo.db?mode=replica").unwrap()).is_err());
        assert!(ConnectionType::try_from(Url::parse("libsql://./foo.db").unwrap()).is_err());
    }

    #[test]
    fn merges_migrations_per_backend() {
        let a: Migrations = BTreeMap::from([("sqlite", BTreeMap::from([("1.up.sql", "a")]))]);
        let b: Migrations = BTreeMap::from([("sqlite", BTreeMap::from([("2.up.sql", "b")]))]);
        let merged = merge_nested_migrations(vec![a, b]);
        assert_eq!(merged["sqlite"].len(), 2);
    }

    #[tokio::test]
    async fn migrations_run_once() {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        let migrations: Migrations = BTreeMap::from([(
            "sqlite",
            BTreeMap::from([
                ("0001_things.up.sql", "CREATE TABLE things (id INTEGER PRIMARY KEY);"),
                ("0001_things.down.sql", "DROP TABLE things;"),
            ]),
        )]);

        run_migrations(&conn, &migrations).await.unwrap();
        conn.execute("INSERT INTO things (id) VALUES (1)", ()).await.unwrap();
        // a second run must neither re-create nor drop the table
        run_migrations(&conn, &migrations).await.unwrap();

        let mut rows = conn.query("SELECT COUNT(*) FROM things", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn later_migrations_are_applied_on_top() {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        let first: Migrations = BTreeMap::from([(
            "sqlite",
            BTreeMap::from([("0001_things.up.sql", "CREATE TABLE things (id INTEGER PRIMARY KEY);")]),
        )]);
        run_migrations(&conn, &first).await.unwrap();

        let both = merge_nested_migrations(vec![
            first,
            BTreeMap::from([(
                "sqlite",
                BTreeMap::from([("0002_things_name.up.sql", "ALTER TABLE things ADD COLUMN name TEXT;")]),
            )]),
        ]);
        run_migrations(&conn, &both).await.unwrap();

        conn.execute("INSERT INTO things (id, name) VALUES (1, 'a')", ())
            .await
            .unwrap();
    }
}
