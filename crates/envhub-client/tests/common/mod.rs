use environment::{EnvironmentService, EnvironmentServiceParams, Repository};
use shared::primitives::SqlMigrationLoader;
use tempfile::TempDir;

/// A real envhub server on an ephemeral port, backed by a temporary database.
pub struct TestServer {
    pub base_url: String,
    _dir: TempDir,
}

#[allow(dead_code)]
pub async fn spawn_server() -> TestServer {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (_db, conn) = shared::test_utils::repository::setup_file_database(
        &dir.path().join("envhub.db"),
        vec![<Repository as SqlMigrationLoader>::load_sql_migrations()],
    )
    .await
    .expect("Failed to setup test database");

    let service = EnvironmentService::new(EnvironmentServiceParams {
        repository: Repository::new(conn),
    });
    let app = environment::initiate_api_router(service, "/api/v1");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });

    TestServer {
        base_url: format!("http://{addr}/api/v1"),
        _dir: dir,
    }
}

/// A server that answers every `GET /api/v1/env` with `body`, for responses a
/// real envhub never produces.
#[allow(dead_code)]
pub async fn spawn_stub(body: serde_json::Value) -> String {
    let app = axum::Router::new().route(
        "/api/v1/env",
        axum::routing::get(move || {
            let body = body.clone();
            async move { axum::Json(body) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server failed");
    });

    format!("http://{addr}/api/v1")
}
