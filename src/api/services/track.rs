//! 追踪命中端点（像素 + 点击重定向）
//!
//! 两条路径都是 fail-open：追踪基础设施的任何失败对收件人不可见。
//! 像素永远返回 200 + GIF，重定向只要有可用目标就永远 302。
//! 事件只进内存缓冲，响应不等待落库。

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::rewriter::ReferenceKind;
use crate::storage::SeaOrmStorage;
use crate::tracking::{EngagementEvent, EventDetail, EventManager};
use crate::utils::ip::extract_client_ip;
use crate::utils::is_valid_tracking_id;
use crate::utils::url_validator::validate_redirect_target;

/// 1×1 透明 GIF
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xFF, 0xFF,
    0xFF, 0x00, 0x00, 0x00, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

#[derive(Debug, Deserialize)]
pub struct PixelQuery {
    pub id: Option<String>,
    pub campaign: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    pub id: Option<String>,
    pub url: Option<String>,
}

pub struct TrackService {}

impl TrackService {
    /// 打开像素：GET /t/open.gif
    pub async fn handle_pixel(
        req: HttpRequest,
        query: web::Query<PixelQuery>,
        storage: web::Data<Arc<SeaOrmStorage>>,
        manager: web::Data<Arc<EventManager>>,
    ) -> impl Responder {
        let query = query.into_inner();

        // 解析失败不影响响应，最多丢一次 open 计数
        match Self::resolve_open_context(&query, &storage).await {
            Some((campaign_id, recipient_id, tracking_id)) => {
                let event = EngagementEvent::new(
                    campaign_id,
                    recipient_id,
                    EventDetail::Opened { tracking_id },
                )
                .with_client_info(user_agent(&req), extract_client_ip(&req));
                manager.record(event);
            }
            None => {
                trace!("像素命中无法归因，仅返回 GIF");
            }
        }

        Self::pixel_response()
    }

    /// 点击重定向：GET /t/click
    pub async fn handle_click(
        req: HttpRequest,
        query: web::Query<ClickQuery>,
        storage: web::Data<Arc<SeaOrmStorage>>,
        manager: web::Data<Arc<EventManager>>,
    ) -> impl Responder {
        let query = query.into_inner();

        // 1. 优先用追踪引用里的目标，拿不到退回 url 参数
        let resolved = Self::resolve_click_context(&query, &storage).await;
        let target = resolved
            .as_ref()
            .and_then(|(_, _, _, target)| target.clone())
            .or_else(|| query.url.clone());

        let Some(target) = target else {
            // 无任何可跳转目标，给自动化调用方一个明确的 4xx
            return HttpResponse::build(StatusCode::BAD_REQUEST)
                .insert_header(("Content-Type", "text/plain; charset=utf-8"))
                .body("missing url parameter");
        };

        if let Err(e) = validate_redirect_target(&target) {
            debug!("拒绝跳转目标 {}: {}", target, e);
            return HttpResponse::build(StatusCode::BAD_REQUEST)
                .insert_header(("Content-Type", "text/plain; charset=utf-8"))
                .body("invalid redirect target");
        }

        // 2. 能归因就记事件；记不了照样跳转
        if let Some((campaign_id, recipient_id, tracking_id, _)) = resolved {
            let event = EngagementEvent::new(
                campaign_id,
                recipient_id,
                EventDetail::Clicked {
                    link_url: target.clone(),
                    tracking_id,
                },
            )
            .with_client_info(user_agent(&req), extract_client_ip(&req));
            manager.record(event);
        } else {
            debug!("点击命中无法归因，直接跳转: {}", target);
        }

        HttpResponse::build(StatusCode::FOUND)
            .insert_header(("Location", target))
            .insert_header(("Cache-Control", "no-store"))
            .finish()
    }

    /// 像素归因：优先 tracking_id 解析，退回 campaign/contact 参数
    async fn resolve_open_context(
        query: &PixelQuery,
        storage: &SeaOrmStorage,
    ) -> Option<(String, Option<String>, Option<String>)> {
        if let Some(id) = query.id.as_deref()
            && is_valid_tracking_id(id)
        {
            match storage.resolve_tracking_id(id).await {
                Ok(Some(reference)) if reference.kind == ReferenceKind::Pixel.as_str() => {
                    return Some((
                        reference.campaign_id,
                        Some(reference.recipient_id),
                        Some(reference.tracking_id),
                    ));
                }
                Ok(Some(reference)) => {
                    debug!(
                        "tracking_id {} 的种类是 {}，按像素命中处理",
                        id, reference.kind
                    );
                    return Some((
                        reference.campaign_id,
                        Some(reference.recipient_id),
                        Some(reference.tracking_id),
                    ));
                }
                Ok(None) => debug!("未知 tracking_id: {}", id),
                Err(e) => debug!("tracking_id {} 解析失败: {}", id, e),
            }
        }

        // 引用解析不了时退回查询参数归因
        query
            .campaign
            .as_ref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| (c.clone(), query.contact.clone(), query.id.clone()))
    }

    /// 点击归因：返回 (campaign, recipient, tracking_id, 引用里的目标)
    async fn resolve_click_context(
        query: &ClickQuery,
        storage: &SeaOrmStorage,
    ) -> Option<(String, Option<String>, Option<String>, Option<String>)> {
        let id = query.id.as_deref()?;
        if !is_valid_tracking_id(id) {
            trace!("非法 tracking_id 被拒: {}", id);
            return None;
        }

        match storage.resolve_tracking_id(id).await {
            Ok(Some(reference)) if reference.kind == ReferenceKind::Link.as_str() => Some((
                reference.campaign_id,
                Some(reference.recipient_id),
                Some(reference.tracking_id),
                reference.target_url,
            )),
            Ok(Some(reference)) => {
                // 非链接种类的引用只提供归因，目标一律退回 url 参数
                debug!(
                    "tracking_id {} 的种类是 {}，按点击命中处理",
                    id, reference.kind
                );
                Some((
                    reference.campaign_id,
                    Some(reference.recipient_id),
                    Some(reference.tracking_id),
                    None,
                ))
            }
            Ok(None) => {
                debug!("未知 tracking_id: {}", id);
                None
            }
            Err(e) => {
                debug!("tracking_id {} 解析失败: {}", id, e);
                None
            }
        }
    }

    #[inline]
    fn pixel_response() -> HttpResponse {
        HttpResponse::Ok()
            .insert_header(("Content-Type", "image/gif"))
            .insert_header(("Cache-Control", "no-store, no-cache, must-revalidate"))
            .insert_header(("Pragma", "no-cache"))
            .insert_header(("Expires", "0"))
            .body(PIXEL_GIF)
    }
}

fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

/// 追踪路由
pub fn tracking_routes() -> actix_web::Scope {
    web::scope("/t")
        .route("/open.gif", web::get().to(TrackService::handle_pixel))
        .route("/click", web::get().to(TrackService::handle_click))
}
