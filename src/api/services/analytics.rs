//! 活动分析端点

use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use tracing::error;

use super::ApiResponse;
use crate::services::EngagementService;

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    /// 分桶宽度（秒），默认 1 即事件原始粒度
    #[serde(default = "default_bucket_secs")]
    pub bucket_secs: u64,
}

fn default_bucket_secs() -> u64 {
    1
}

pub struct AnalyticsService {}

impl AnalyticsService {
    /// GET /api/campaigns/{id}/analytics
    pub async fn handle_report(
        path: web::Path<String>,
        service: web::Data<EngagementService>,
    ) -> impl Responder {
        let campaign_id = path.into_inner();
        match service.campaign_report(&campaign_id).await {
            Ok(report) => HttpResponse::Ok().json(ApiResponse::ok(report)),
            Err(e) => {
                error!("活动 {} 报表查询失败: {}", campaign_id, e);
                HttpResponse::InternalServerError()
                    .json(ApiResponse::<()>::error(500, e.format_simple()))
            }
        }
    }

    /// GET /api/campaigns/{id}/series
    pub async fn handle_series(
        path: web::Path<String>,
        query: web::Query<SeriesQuery>,
        service: web::Data<EngagementService>,
    ) -> impl Responder {
        let campaign_id = path.into_inner();
        match service
            .engagement_series(&campaign_id, query.bucket_secs)
            .await
        {
            Ok(series) => HttpResponse::Ok().json(ApiResponse::ok(series)),
            Err(e) => {
                error!("活动 {} 序列查询失败: {}", campaign_id, e);
                HttpResponse::InternalServerError()
                    .json(ApiResponse::<()>::error(500, e.format_simple()))
            }
        }
    }

    /// GET /api/campaigns/{id}/export
    ///
    /// 自包含 JSON 文档，带 exported_at 时间戳。
    pub async fn handle_export(
        path: web::Path<String>,
        service: web::Data<EngagementService>,
    ) -> impl Responder {
        let campaign_id = path.into_inner();
        match service.export_campaign(&campaign_id).await {
            Ok(doc) => HttpResponse::Ok()
                .insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"campaign-{}.json\"", campaign_id),
                ))
                .json(doc),
            Err(e) => {
                error!("活动 {} 导出失败: {}", campaign_id, e);
                HttpResponse::InternalServerError()
                    .json(ApiResponse::<()>::error(500, e.format_simple()))
            }
        }
    }

    /// POST /api/campaigns/{id}/rebuild
    ///
    /// 从事件日志重建汇总，返回重放的事件数。
    pub async fn handle_rebuild(
        path: web::Path<String>,
        service: web::Data<EngagementService>,
    ) -> impl Responder {
        let campaign_id = path.into_inner();
        match service.rebuild_campaign(&campaign_id).await {
            Ok(applied) => HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
                "campaign_id": campaign_id,
                "events_replayed": applied,
            }))),
            Err(e) => {
                error!("活动 {} 重建失败: {}", campaign_id, e);
                HttpResponse::InternalServerError()
                    .json(ApiResponse::<()>::error(500, e.format_simple()))
            }
        }
    }
}

/// 分析路由（受鉴权）
pub fn analytics_routes() -> actix_web::Scope {
    web::scope("/campaigns")
        .route(
            "/{id}/analytics",
            web::get().to(AnalyticsService::handle_report),
        )
        .route(
            "/{id}/series",
            web::get().to(AnalyticsService::handle_series),
        )
        .route(
            "/{id}/export",
            web::get().to(AnalyticsService::handle_export),
        )
        .route(
            "/{id}/rebuild",
            web::post().to(AnalyticsService::handle_rebuild),
        )
}
