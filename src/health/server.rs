//! Liveness HTTP endpoint.
//!
//! # Routes
//! - `GET /health`: fixed `Healthy!` body while the process is alive
//! - `GET /status`: JSON `StatusReport` of the reconciliation loop

use axum::{extract::State, routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::health::state::{StatusHandle, StatusReport};

/// Build the liveness router.
pub fn router(status: StatusHandle) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/status", get(get_status))
        .with_state(status)
        .layer(TraceLayer::new_for_http())
}

pub async fn get_health() -> &'static str {
    "Healthy!"
}

pub async fn get_status(State(status): State<StatusHandle>) -> Json<StatusReport> {
    Json(StatusReport::clone(&status.load()))
}

/// Serves the liveness router until shutdown.
pub struct HealthServer {
    router: Router,
}

impl HealthServer {
    pub fn new(status: StatusHandle) -> Self {
        Self {
            router: router(status),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Liveness endpoint starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Liveness endpoint stopped");
        Ok(())
    }
}
