use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::analytics::PersistenceHandle;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C 或 SIGTERM
pub async fn listen_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(
                "Failed to listen for Ctrl+C: {}. Waiting for other signals.",
                e
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received, flushing stats...");
}

/// 停止持久化任务（在超时内完成）
pub async fn stop_persistence(persistence: PersistenceHandle) {
    match timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        persistence.shutdown(),
    )
    .await
    {
        Ok(Some(summary)) if summary.failed > 0 => {
            warn!(
                "Stats flushed on shutdown with {} failures",
                summary.failed
            );
        }
        Ok(_) => {
            info!("All shutdown tasks completed successfully");
        }
        Err(_) => {
            error!(
                "Shutdown tasks timed out after {} seconds, last stats window may be lost",
                SHUTDOWN_TIMEOUT_SECS
            );
        }
    }
}
