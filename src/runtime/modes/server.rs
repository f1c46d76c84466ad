//! Server mode
//!
//! This module contains the HTTP server startup logic.

use actix_web::middleware::{Condition, Logger};
use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::services::configure_redirect;
use crate::config::{ServerMode, StaticConfig};
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// This function:
/// 1. Prepares server components (counter store, persistence task)
/// 2. Configures and starts the HTTP server
/// 3. Waits for a shutdown signal, then stops the server and flushes stats
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: StaticConfig) -> Result<()> {
    let startup = lifetime::startup::prepare_server_startup(&config).map_err(|e| {
        tracing::error!("Server startup failed: {:#}", e);
        e
    })?;

    let redirect_state = startup.redirect_state.clone();
    let route_prefix = config.server.route_prefix.clone();
    let debug_mode = config.server.mode == ServerMode::Debug;

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Condition::new(debug_mode, Logger::default()))
            .app_data(redirect_state.clone())
            .configure(configure_redirect(&route_prefix))
    })
    .disable_signals();

    let server = match config.server.workers {
        Some(workers) => server.workers(workers),
        None => server,
    };

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();
    warn!(
        "Server is running at: http://{}{}/",
        bind_address, config.server.route_prefix
    );

    let handle = server.handle();
    let result = tokio::select! {
        res = server => res.context("HTTP server exited with error"),
        _ = lifetime::shutdown::listen_for_shutdown() => {
            handle.stop(true).await;
            Ok(())
        }
    };

    // 服务器已停止，不会再有新的访问，最后一个窗口可以安全落盘
    info!(
        "Server stopped, {} unknown-link visits ignored during this run",
        startup.store.rejected_visits()
    );
    lifetime::shutdown::stop_persistence(startup.persistence).await;

    result
}
