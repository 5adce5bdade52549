#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use core::time::Duration;
use eventgen_core::{GeneratorSupervisor, MessageFactory};
use server::api::{AppState, router};
use server::config::{CliArgs, ServerConfig};
use server::event::ChargingEventFactory;
use server::sink::LogConnector;
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry(config.log_format)?;

    let supervisor =
        GeneratorSupervisor::new(Arc::new(LogConnector), config.sink_settings.clone());
    let events = ChargingEventFactory::new(config.location.clone());
    let factory: Arc<dyn MessageFactory> = Arc::new(move || events.event());

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&config);

    if config.autostart {
        supervisor
            .start(Arc::clone(&factory), config.defaults)
            .await
            .context("failed to start the event generator")?;
    }

    let app = router(AppState {
        supervisor: supervisor.clone(),
        factory,
        defaults: config.defaults,
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(supervisor, config.shutdown_timeout))
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting event generator on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting event generator on {} publishing to {}",
            config.server_addr,
            config.sink_settings.topic_id
        );
    }
}

async fn shutdown_signal(supervisor: GeneratorSupervisor, drain_timeout: Duration) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    supervisor.stop();
    if tokio::time::timeout(drain_timeout, supervisor.wait_until_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout = ?drain_timeout,
            workers = supervisor.worker_count(),
            "Generator did not drain in time"
        );
    }
}
