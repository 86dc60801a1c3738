//! 服务商 webhook 事件入口
//!
//! 投递服务商回调 sent/delivered/bounced/complained/unsubscribed。
//! 事件进缓冲即返回 202；event_ref 去重在落库阶段完成。

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::ApiResponse;
use crate::tracking::{EngagementEvent, EventDetail, EventKind, EventManager};

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub campaign_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub event_type: String,
    /// 服务商分配的事件引用，用于重投去重
    #[serde(default)]
    pub event_ref: Option<String>,
    #[serde(default)]
    pub bounce_reason: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

pub struct IngestService {}

impl IngestService {
    /// POST /api/events
    pub async fn handle_webhook(
        body: web::Json<WebhookEvent>,
        manager: web::Data<Arc<EventManager>>,
    ) -> impl Responder {
        let payload = body.into_inner();

        if payload.campaign_id.trim().is_empty() {
            return HttpResponse::BadRequest()
                .json(ApiResponse::<()>::error(400, "campaign_id 不能为空"));
        }

        let detail = match EventKind::parse(&payload.event_type) {
            Some(EventKind::Sent) => EventDetail::Sent,
            Some(EventKind::Delivered) => EventDetail::Delivered,
            Some(EventKind::Bounced) => EventDetail::Bounced {
                reason: payload.bounce_reason.clone(),
            },
            Some(EventKind::Complained) => EventDetail::Complained,
            Some(EventKind::Unsubscribed) => EventDetail::Unsubscribed,
            // opened/clicked 只能从追踪命中产生
            Some(other) => {
                return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
                    400,
                    format!("事件类型 '{}' 不接受 webhook 上报", other),
                ));
            }
            None => {
                return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
                    400,
                    format!("未知事件类型: {}", payload.event_type),
                ));
            }
        };

        let mut event = EngagementEvent::new(payload.campaign_id, payload.recipient_id, detail)
            .with_event_ref(payload.event_ref);
        if let Some(t) = payload.occurred_at {
            event = event.with_occurred_at(t);
        }

        debug!(
            "webhook 事件入队：活动 {} 类型 {}",
            event.campaign_id,
            event.kind()
        );
        manager.record(event);

        HttpResponse::Accepted().json(ApiResponse::ok("queued"))
    }
}

/// webhook 路由（挂在受鉴权的 /api 作用域下）
pub fn ingest_routes() -> actix_web::Scope {
    web::scope("/events").route("", web::post().to(IngestService::handle_webhook))
}
