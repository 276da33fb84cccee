//! # marthad: Martha tent controller daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`marthad.toml`, env vars)
//! - Install logging
//! - Drive every relay off before anything else runs
//! - Open the `SQLite` pool, run migrations and load the controller settings
//! - Start the sensor, control, broadcast, config and watchdog tasks
//! - Serve the API, live feed and dashboard
//! - On Ctrl-C / SIGTERM: stop the tasks, then drive every relay off
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer, no domain logic belongs here.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;

use martha_adapter_http_axum::state::AppState;
use martha_adapter_storage_sqlite_sqlx::{
    Config as DbConfig, SqliteConfigRepository, SqliteRelayLogStore,
};
use martha_adapter_virtual::SimulatedTent;
use martha_app::broadcaster::Broadcaster;
use martha_app::event_bus::InProcessEventBus;
use martha_app::ports::{LogLevelControl, RelayDriver};
use martha_app::runtime::Runtime;
use martha_app::services::config_service::ConfigService;
use martha_app::services::controller::{Controller, FW_VERSION};
use martha_domain::event::RelayEvent;
use martha_domain::relay::{PinOutputs, RelaySource};

use marthad::clock::SystemClock;
use marthad::config::Config;
use marthad::logging;

/// Live feed subscribers may fall this many snapshots behind.
const SNAPSHOT_BUFFER: usize = 16;
/// Open SSE and WebSocket connections get this long to finish on shutdown.
const SERVER_DRAIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let clock = SystemClock::new();
    let config = Config::load()?;

    // Logging
    let log_control = Arc::new(logging::init(&config.logging.filter));
    tracing::info!(fw_version = FW_VERSION, "marthad starting");

    // Relay board, held off until the controller takes over
    let tent = SimulatedTent::new(config.seed());
    tent.apply(PinOutputs::default()).await?;

    // Database
    let db = DbConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Settings, defaults on first boot
    let config_service = Arc::new(ConfigService::new(SqliteConfigRepository::new(pool.clone())));
    let settings = config_service.begin().await?;
    if let Err(err) = log_control.set_level(settings.log_level) {
        tracing::warn!(error = %err, "failed to apply stored log level");
    }

    // Controller
    let relay_events = Arc::new(InProcessEventBus::<RelayEvent>::new(256));
    let controller = Arc::new(Controller::new(
        tent,
        SqliteRelayLogStore::new(pool).with_retention(config.database.relay_log_retention),
        Arc::clone(&relay_events),
        clock,
        &settings,
    ));
    controller.begin().await?;

    // Background tasks
    let broadcaster = Arc::new(Broadcaster::new(SNAPSHOT_BUFFER));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Runtime {
        controller: Arc::clone(&controller),
        config_service: Arc::clone(&config_service),
        broadcaster: Arc::clone(&broadcaster),
        log_control: Arc::clone(&log_control),
        periods: config.periods(),
    }
    .spawn(&shutdown_rx);

    // HTTP
    let state = AppState::from_arcs(
        Arc::clone(&controller),
        config_service,
        broadcaster,
        relay_events,
        log_control,
    );
    let app = martha_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "marthad listening");

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(stopped(shutdown_rx))
            .await
    });

    shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::debug!("every task already stopped");
    }

    match tokio::time::timeout(SERVER_DRAIN, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => tracing::error!(error = %err, "server failed"),
        Ok(Err(err)) => tracing::error!(error = %err, "server task panicked"),
        Err(_) => tracing::warn!("dropping connections still open after drain"),
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "background task panicked");
        }
    }

    controller.force_all_off(RelaySource::Shutdown).await?;
    db.close().await;
    tracing::info!("relays off, marthad stopped");
    Ok(())
}

async fn stopped(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        tracing::debug!("shutdown sender dropped");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
