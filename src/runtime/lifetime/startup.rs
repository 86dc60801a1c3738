//! 服务器启动准备
//!
//! 组装存储、事件缓冲和服务层。所有依赖显式构造、显式传递，
//! 处理器通过 `web::Data` 注入，不走进程级单例。

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::StaticConfig;
use crate::rewriter::Rewriter;
use crate::services::EngagementService;
use crate::storage::SeaOrmStorage;
use crate::tracking::{EventManager, EventSink};

pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub event_manager: Arc<EventManager>,
    pub engagement_service: EngagementService,
}

/// 准备服务器启动的上下文：连接数据库、跑迁移、启动事件刷盘任务
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let storage = Arc::new(
        SeaOrmStorage::new(&config.database)
            .await
            .context("Failed to create storage backend")?,
    );
    info!("Using storage backend: {}", storage.backend_name());

    let event_manager = Arc::new(EventManager::new(
        config.tracking.max_events_before_flush,
        config.tracking.flush_interval_secs,
    ));
    event_manager.set_sink(Arc::clone(&storage) as Arc<dyn EventSink>);
    event_manager.start();
    debug!(
        "EventManager started (interval {}s, threshold {})",
        config.tracking.flush_interval_secs, config.tracking.max_events_before_flush
    );

    let rewriter = Arc::new(Rewriter::new(config.tracking.public_base_url.clone()));
    let engagement_service = EngagementService::new(Arc::clone(&storage), rewriter);

    info!(
        "Startup preparation completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        storage,
        event_manager,
        engagement_service,
    })
}
