//! 健康检查端点

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use tracing::warn;

use crate::storage::SeaOrmStorage;

/// 数据库探测超时
const PING_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    database: &'static str,
    version: &'static str,
}

pub struct HealthService {}

impl HealthService {
    /// GET /health
    pub async fn handle_health(storage: web::Data<Arc<SeaOrmStorage>>) -> impl Responder {
        match storage.ping(PING_TIMEOUT_MS).await {
            Ok(()) => HttpResponse::Ok().json(HealthStatus {
                status: "ok",
                database: "up",
                version: env!("CARGO_PKG_VERSION"),
            }),
            Err(e) => {
                warn!("健康检查失败: {}", e);
                HttpResponse::ServiceUnavailable().json(HealthStatus {
                    status: "degraded",
                    database: "down",
                    version: env!("CARGO_PKG_VERSION"),
                })
            }
        }
    }
}

/// 健康检查路由（无鉴权）
pub fn health_routes() -> actix_web::Scope {
    web::scope("/health").route("", web::get().to(HealthService::handle_health))
}
