//! 优雅关闭
//!
//! 收到 Ctrl+C 后把事件缓冲里剩余的事件刷入数据库再退出。
//! 刷盘带超时：数据库不可用时不无限等待。

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::tracking::EventManager;

/// 关闭任务总超时（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待关闭信号，然后执行收尾刷盘
pub async fn listen_for_shutdown(event_manager: Arc<EventManager>) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, flushing buffered events...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    match timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        event_manager.shutdown_flush(),
    )
    .await
    {
        Ok(()) => {
            let remaining = event_manager.pending_count();
            if remaining > 0 {
                // 刷盘失败会把事件放回缓冲，这部分在进程退出后丢失
                error!("{} 条事件未能在关闭前落库", remaining);
            } else {
                info!("Event buffer flushed, shutting down");
            }
        }
        Err(_) => {
            error!(
                "Shutdown flush timed out after {} seconds, exiting anyway",
                SHUTDOWN_TIMEOUT_SECS
            );
        }
    }
}
