//! Gateway controller (v1)
//!
//! Keeps an nginx instance routing to whatever the cluster currently runs.
//!
//! # Architecture Overview
//!
//! ```text
//!     cluster manifest                                  ┌──────────────┐
//!     ────────────────┐                                 │    nginx     │
//!                     ▼                                 │              │
//!              ┌────────────┐   ┌──────────┐   ┌───────▶│ nginx.conf   │
//!              │  topology  │──▶│  render  │──▶│ proxy  │              │
//!              │  provider  │   │ template │   │manager │──▶ -t / -s reload
//!              └────────────┘   └──────────┘   └────────┘              │
//!                     ▲                                 │  log pipe    │
//!              ┌──────┴──────┐                          └──────┬───────┘
//!              │ controller  │  every refresh interval         │
//!              │    loop     │                                 ▼
//!              └─────────────┘                          ┌──────────────┐
//!                                                       │  log drain   │──▶ tracing
//!     liveness probe ──▶ health (GET /health, /status)  └──────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;
use tokio::task::JoinError;

use gateway_controller::config::{loader, Args};
use gateway_controller::controller::Controller;
use gateway_controller::health::{HealthServer, StatusHandle};
use gateway_controller::lifecycle::{signals, Shutdown};
use gateway_controller::observability::{logging, LogDrain, TracingSink};
use gateway_controller::proxy::{DryRunManager, NginxManager, ProxyManager};
use gateway_controller::render::{Renderer, StaticConfig};
use gateway_controller::topology::ManifestProvider;

type BoxError = Box<dyn std::error::Error>;

fn joined(res: Result<gateway_controller::Result<()>, JoinError>) -> Result<(), BoxError> {
    res??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let config = loader::resolve(&args)?;
    logging::init(&config.observability)?;

    tracing::info!("gateway-controller v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        refresh_interval_secs = config.controller.refresh_interval_secs,
        cluster_zone = %config.controller.cluster_zone,
        manifest = ?config.controller.manifest_path,
        nginx_config = ?config.nginx.config_file,
        dry_run = config.controller.dry_run,
        "Configuration loaded"
    );

    // Template errors are programmer errors; refuse to start.
    let renderer = Renderer::new(StaticConfig::from(&config))?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    // Reading must begin before nginx can write a single line.
    let mut drain = LogDrain::new(&config.nginx.log_pipe, TracingSink).spawn(shutdown.subscribe())?;

    let manager: Box<dyn ProxyManager> = if config.controller.dry_run {
        Box::new(DryRunManager::new(renderer))
    } else {
        Box::new(NginxManager::new(config.nginx.clone(), renderer))
    };
    let provider = Box::new(ManifestProvider::new(
        &config.controller.manifest_path,
        config.controller.annotation_prefix.clone(),
    ));

    let status = StatusHandle::new();
    let listener = TcpListener::bind(&config.health.bind_address).await?;
    let health = tokio::spawn(HealthServer::new(status.clone()).run(listener, shutdown.subscribe()));

    let controller = Controller::new(provider, manager, config.controller.refresh_interval(), status);
    let mut reconcile = tokio::spawn(controller.run(shutdown.subscribe()));

    let outcome = tokio::select! {
        res = &mut reconcile => joined(res),
        res = &mut drain => match res {
            // A clean drain exit only happens on shutdown; let the loop finish its tick.
            Ok(Ok(())) => joined(reconcile.await),
            other => joined(other),
        },
    };

    shutdown.trigger();
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Fatal error, exiting");
        return outcome;
    }

    match health.await {
        Ok(Err(e)) => tracing::warn!(error = %e, "Liveness endpoint failed"),
        Err(e) => tracing::warn!(error = %e, "Liveness task panicked"),
        Ok(Ok(())) => {}
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
