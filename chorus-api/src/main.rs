use chorus_api::{
    env::{self, DatabaseEnv, InitError, ServerEnv},
    server::{self, ServerState},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Resolves once the process is asked to stop.
fn shutdown_signal() -> Result<impl Future<Output = ()>, InitError> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(InitError::Signal)?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "Could not listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            terminate.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => warn!("Received Ctrl+C, shutting down"),
            () = terminate => warn!("Received SIGTERM, shutting down"),
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    env::install_tracing();
    env::load_dotenv()?;
    let server_env: ServerEnv = env::from_env()?;
    let database_env: DatabaseEnv = env::from_env()?;

    let db_client = env::connect_db(&database_env).await?;
    let shutdown = CancellationToken::new();
    let state = ServerState {
        db_client: Arc::new(db_client),
        shutdown: shutdown.clone(),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = server_env.socket_address();
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let signal = shutdown_signal()?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            // Aborts storage calls of requests still in flight.
            shutdown.cancel();
        })
        .await
        .map_err(InitError::TcpServe)?;

    info!("Server stopped");
    Ok(())
}
