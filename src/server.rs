use anyhow::{Context, Result};
use axum::Router;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::{net::TcpListener, signal, sync::oneshot};
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Binds the configured address and serves `router` until a shutdown signal arrives.
pub async fn serve(server: &ServerConfig, router: Router) -> Result<()> {
    let addr = server.listen_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;

    info!("Server listening on {}", listener.local_addr()?);

    serve_with_shutdown(listener, router, shutdown_signal(), server.shutdown_timeout).await
}

/// Serves on an already bound listener.
/// Once `shutdown` resolves, in-flight requests get `grace` to finish before the server gives up.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
    grace: Duration,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();

    let graceful = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    });

    let server = graceful.into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.context("Server error")?;
        }
        Ok(()) = signalled_rx => {
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result.context("Server error")?,
                Err(_) => warn!("In-flight requests did not finish within {:?}, forcing shutdown", grace),
            }
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
/// Listens for SIGTERM and SIGINT signals
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        },
    }
}
