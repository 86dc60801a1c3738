//! 发送侧改写端点
//!
//! 邮件编排方把渲染好的 HTML 发过来，拿回可追踪版本。
//! 追踪引用入库失败时整个请求失败（绝不静默发出未追踪的正文）。

use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::ApiResponse;
use crate::errors::MailbeaconError;
use crate::rewriter::RewriteContext;
use crate::services::EngagementService;

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub html_body: String,
    pub campaign_id: String,
    pub recipient_id: String,
    #[serde(default = "default_true")]
    pub track_opens: bool,
    #[serde(default = "default_true")]
    pub track_clicks: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewriteResponse {
    pub html: String,
    pub tracking_id: String,
    /// 写入的追踪引用数（像素 + 改写的链接数）
    pub reference_count: usize,
}

pub struct SendService {}

impl SendService {
    /// POST /api/send/rewrite
    pub async fn handle_rewrite(
        body: web::Json<RewriteRequest>,
        service: web::Data<EngagementService>,
    ) -> impl Responder {
        let payload = body.into_inner();
        let ctx = RewriteContext {
            campaign_id: payload.campaign_id,
            recipient_id: payload.recipient_id,
            track_opens: payload.track_opens,
            track_clicks: payload.track_clicks,
        };

        match service.rewrite_for_send(&payload.html_body, &ctx).await {
            Ok(outcome) => HttpResponse::Ok().json(ApiResponse::ok(RewriteResponse {
                html: outcome.html,
                tracking_id: outcome.tracking_id,
                reference_count: outcome.references.len(),
            })),
            Err(MailbeaconError::Validation(msg)) => {
                HttpResponse::BadRequest().json(ApiResponse::<()>::error(400, msg))
            }
            Err(e) => {
                error!("改写请求失败: {}", e);
                HttpResponse::InternalServerError()
                    .json(ApiResponse::<()>::error(500, e.format_simple()))
            }
        }
    }
}

/// 发送路由（受鉴权）
pub fn send_routes() -> actix_web::Scope {
    web::scope("/send").route("/rewrite", web::post().to(SendService::handle_rewrite))
}
