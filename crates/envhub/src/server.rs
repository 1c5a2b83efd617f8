use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use environment::EnvironmentService;
use shared::error::CommonError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct StartAxumServerParams {
    pub host: String,
    pub port: u16,
    pub base_path: String,
    pub system_shutdown_signal_rx: tokio::sync::broadcast::Receiver<()>,
    pub service: EnvironmentService,
}

/// Binds the API and returns the serving future together with its handle.
///
/// The server stops accepting connections once the shutdown signal fires and
/// gives in-flight requests up to 30 seconds to finish.
pub async fn start_axum_server(
    params: StartAxumServerParams,
) -> Result<
    (
        impl Future<Output = Result<(), std::io::Error>>,
        axum_server::Handle,
        SocketAddr,
    ),
    CommonError,
> {
    let mut system_shutdown_signal_rx = params.system_shutdown_signal_rx;
    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .map_err(|e| CommonError::AddrParseError { source: e })?;

    info!("Starting server on {}", addr);

    let handle = axum_server::Handle::new();

    let router = environment::initiate_api_router(params.service, &params.base_path)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!(base_path = %params.base_path, "Router initiated");

    let server_fut = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(router.into_make_service());

    let handle_clone = handle.clone();

    tokio::spawn(async move {
        let _ = system_shutdown_signal_rx.recv().await;

        info!("Shutting down axum server, waiting for in-flight requests to complete...");
        handle_clone.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
    });

    Ok((server_fut, handle, addr))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
