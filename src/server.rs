use crate::handlers::{claim, health_check, metrics, root, status, AppState};
use crate::middleware::logging_middleware;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the faucet router over `state`
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/claim", post(claim))
        // Operational endpoints
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware))
        )
}

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl Server {
    /// `shutdown` is flipped to `true` once the HTTP server has stopped, so
    /// background tasks subscribed to it can exit.
    pub fn new(state: AppState, bind_addr: SocketAddr, shutdown: watch::Sender<bool>) -> Self {
        Self {
            app: create_app(state),
            bind_addr,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("Faucet server listening on {}", self.bind_addr);
        tracing::info!("Claims accepted at POST /claim");
        tracing::info!("Health check available at /health");

        // Run server with graceful shutdown
        let served = axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        self.shutdown.send_replace(true);
        served?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
