//! Calendar platform server.
//!
//! Loads configuration, wires the data layer, the session subsystem and the live
//! notification pipeline, then serves HTTP until Ctrl-C or SIGTERM.

use domain::{refresh_token_store, MemoryDatabase};
use log::*;
use service::{config::Config, logging::Logger};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use web::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "Starting calendar platform ({} environment)",
        config.runtime_env()
    );

    if config.jwt_secret_key().is_none() {
        error!("JWT_SECRET_KEY must be set to sign access and refresh tokens");
        return ExitCode::FAILURE;
    }

    let database = Arc::new(MemoryDatabase::new());

    let refresh_store = match refresh_token_store::from_config(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to set up the refresh token store: {e}");
            return ExitCode::FAILURE;
        }
    };

    let app_state = match AppState::new(config, database, refresh_store) {
        Ok(app_state) => app_state,
        Err(e) => {
            error!("Invalid token configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let sse_manager = app_state.sse_manager.clone();
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutdown signal received, closing SSE connections");
        // Subscriptions never end on their own, graceful shutdown waits for them.
        sse_manager.shutdown();
    };

    match web::init_server(app_state, shutdown).await {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
