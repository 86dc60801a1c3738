//! Server mode
//!
//! HTTP 服务器组装与启动：路由、CORS、鉴权作用域、优雅关闭。

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Compress, web};
use anyhow::Result;
use tracing::{info, warn};

use crate::api::middleware::ApiAuth;
use crate::api::services::{
    analytics_routes, health_routes, ingest_routes, send_routes, tracking_routes,
};
use crate::config::get_config;
use crate::runtime::lifetime;

/// 从配置构建 CORS 中间件
///
/// 空列表 = 仅同源；`*` = 任意来源（不带凭据）。
fn build_cors_middleware(allowed_origins: &[String]) -> Cors {
    if allowed_origins.is_empty() {
        return Cors::default();
    }

    let mut cors = Cors::default();
    if allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }

    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec!["Content-Type", "Authorization", "Accept"])
        .max_age(3600)
}

/// Run the HTTP server
///
/// 日志系统必须在调用前初始化。
pub async fn run_server() -> Result<()> {
    let config = get_config();

    let startup = lifetime::startup::prepare_server_startup(&config)
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {}", e);
            e
        })?;

    let storage = startup.storage.clone();
    let event_manager = startup.event_manager.clone();
    let engagement_service = startup.engagement_service.clone();

    if config.tracking.api_token.is_empty() {
        warn!("tracking.api_token 未配置，/api 下的端点将返回 404");
    }

    let bind_addr = (config.server.host.clone(), config.server.port);
    let workers = config.server.workers.min(32);
    let cors_origins = config.tracking.cors_allowed_origins.clone();
    let api_token = config.tracking.api_token.clone();

    info!(
        "Starting server at http://{}:{} ({} workers)",
        bind_addr.0, bind_addr.1, workers
    );

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(build_cors_middleware(&cors_origins))
            .app_data(web::Data::new(Arc::clone(&storage)))
            .app_data(web::Data::new(Arc::clone(&event_manager)))
            .app_data(web::Data::new(engagement_service.clone()))
            .service(health_routes())
            .service(tracking_routes())
            .service(
                web::scope("/api")
                    .wrap(ApiAuth::new(api_token.clone()))
                    .service(send_routes())
                    .service(ingest_routes())
                    .service(analytics_routes()),
            )
    })
    .workers(workers)
    .disable_signals()
    .bind(bind_addr)?
    .run();

    // 自行处理信号：先刷事件缓冲，再停 HTTP 服务器
    let server_handle = server.handle();
    let manager_for_shutdown = startup.event_manager.clone();
    let shutdown_task = tokio::spawn(async move {
        lifetime::shutdown::listen_for_shutdown(manager_for_shutdown).await;
        server_handle.stop(true).await;
    });

    server.await?;
    shutdown_task.await.ok();

    info!("Server stopped");
    Ok(())
}
