//! `SyncRelay` server: a real-time session state relay.
//!
//! An axum WebSocket server where clients create or join sessions and send
//! actions; every action replaces the session's state and is broadcast to
//! all connections in that session. State is held in memory only.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9000
//! cargo run --bin syncrelay
//!
//! # Run on custom address, creating sessions on first action
//! cargo run --bin syncrelay -- --bind 127.0.0.1:8080 --unknown-session create
//!
//! # Or via environment variable
//! SYNCRELAY_ADDR=127.0.0.1:8080 cargo run --bin syncrelay
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use syncrelay::config::{RelayCliArgs, RelayConfig};
use syncrelay::router::RouterConfig;
use syncrelay::server::{self, RelayState};
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Held until exit so buffered file logs are flushed.
    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    tracing::info!(
        addr = %config.bind_addr,
        unknown_session = %config.unknown_session,
        "starting syncrelay server"
    );

    let router = RouterConfig {
        unknown_session: config.unknown_session,
    };
    let state = Arc::new(RelayState::with_config(config.max_message_size, router));

    let (bound_addr, mut handle) =
        match server::start_server_with_state(&config.bind_addr, Arc::clone(&state)).await {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(error = %e, "failed to start relay server");
                std::process::exit(1);
            }
        };
    tracing::info!(addr = %bound_addr, "relay server listening");

    tokio::select! {
        result = &mut handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "relay server task failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(
                sessions = state.registry.len(),
                connections = state.hub.connection_count(),
                "shutting down"
            );
            state.hub.close_all_connections();
            handle.abort();
        }
    }
}

/// Initialize logging to stderr, or to `file_path` when given.
///
/// Returns a [`WorkerGuard`] for file logging that must be held until
/// shutdown to ensure all buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some((log_dir, file_name)) = file_path.and_then(|p| Some((p.parent()?, p.file_name()?)))
    else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
