use clap::Args;
use environment::{EnvironmentService, EnvironmentServiceParams, Repository};
use shared::error::CommonError;
use shared::libsql::{
    establish_db_connection, inject_auth_token_to_db_url, merge_nested_migrations,
};
use shared::primitives::SqlMigrationLoader;
use tokio::sync::broadcast;
use tracing::info;
use url::Url;

use crate::server::{StartAxumServerParams, start_axum_server, wait_for_shutdown_signal};

#[derive(Args, Debug, Clone)]
pub struct StartParams {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    /// Path prefix every endpoint is mounted under
    #[arg(long, env = "BASE_PATH", default_value = "/api/v1")]
    pub base_path: String,
    /// `libsql://<path>?mode=local` for a file, `libsql://<host>?mode=remote` for a server
    #[arg(long, env = "DB_CONN_STRING", default_value = "libsql://./envhub.db?mode=local")]
    pub db_conn_string: Url,
    #[arg(long, env = "DB_AUTH_TOKEN")]
    pub db_auth_token: Option<String>,
}

async fn setup_repository(
    conn_string: Url,
    auth_token: Option<String>,
) -> Result<(libsql::Database, shared::libsql::Connection, Repository), CommonError> {
    info!("starting environment database");

    let migrations = Repository::load_sql_migrations();
    let migrations = merge_nested_migrations(vec![migrations]);
    let auth_conn_string = inject_auth_token_to_db_url(&conn_string, &auth_token)?;
    let (db, conn) = establish_db_connection(&auth_conn_string, Some(migrations)).await?;

    let repo = Repository::new(conn.clone());
    Ok((db, conn, repo))
}

pub async fn cmd_start(params: StartParams) -> Result<(), CommonError> {
    let (_db, _conn, repository) =
        setup_repository(params.db_conn_string.clone(), params.db_auth_token.clone()).await?;

    let service = EnvironmentService::new(EnvironmentServiceParams { repository });

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let (server_fut, _handle, addr) = start_axum_server(StartAxumServerParams {
        host: params.host.clone(),
        port: params.port,
        base_path: params.base_path.clone(),
        system_shutdown_signal_rx: shutdown_rx,
        service,
    })
    .await?;

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    info!("envhub listening on http://{}{}", addr, params.base_path);
    server_fut.await?;
    info!("envhub stopped");

    Ok(())
}
