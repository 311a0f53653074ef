pub mod deployment;
pub mod error;
pub mod middleware;
pub mod routes;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::task::JoinHandle;

pub type DeploymentImpl = deployment::Deployment;

/// Error type for server startup
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),
}

/// Binds `address` and serves the API until a shutdown signal arrives.
///
/// Returns the bound address (useful with port 0) and the handle of the
/// server task.
pub async fn start_server(
    deployment: DeploymentImpl,
    address: &str,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let app_router = routes::router(deployment);

    let listener = tokio::net::TcpListener::bind(address).await?;
    let addr: SocketAddr = listener.local_addr()?;

    tracing::info!("Server running on http://{}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app_router)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((addr, handle))
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM on Unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
