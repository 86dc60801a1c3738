//! EventSink 实现
//!
//! 一次 flush 的处理顺序：
//! 1. event_ref 去重（服务商 webhook 可能重投同一事件）
//! 2. 原始事件批量写入 email_events —— 这一步失败整批报错，
//!    调用方会把事件放回缓冲重试
//! 3. 逐条应用汇总 —— 失败只告警不报错：事件已落日志，
//!    汇总可以通过重放修复，比重复计数安全
//!
//! 像素/点击命中没有 event_ref，不做去重（已知限制）。

use std::collections::HashSet;

use async_trait::async_trait;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{debug, warn};

use super::aggregates::apply_event;
use super::retry;
use super::SeaOrmStorage;
use crate::tracking::{EngagementEvent, EventDetail, EventSink};
use migration::entities::{EmailEventEntity, email_event};

#[async_trait]
impl EventSink for SeaOrmStorage {
    async fn persist_events(&self, events: Vec<EngagementEvent>) -> anyhow::Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let events = self.dedup_by_event_ref(events).await?;
        if events.is_empty() {
            debug!("本批事件全部为重投，跳过");
            return Ok(());
        }

        // 先写事件日志：这是唯一事实来源，失败必须让调用方重试
        let rows: Vec<email_event::ActiveModel> =
            events.iter().map(event_to_active_model).collect();
        let inserted = rows.len();
        retry::with_retry("insert_email_events", self.retry_config(), || {
            let rows = rows.clone();
            async move {
                EmailEventEntity::insert_many(rows)
                    .exec_without_returning(self.get_db())
                    .await
            }
        })
        .await?;
        debug!("已写入 {} 条事件日志", inserted);

        // 再应用汇总：失败不回滚事件日志，可由 rebuild 修复
        for event in &events {
            let result = retry::with_retry("apply_event", self.retry_config(), || async {
                apply_event(self.get_db(), event).await
            })
            .await;

            if let Err(e) = result {
                warn!(
                    "活动 {} 的 {} 事件汇总更新失败（事件已落日志，可重放修复）：{}",
                    event.campaign_id,
                    event.kind(),
                    e
                );
            }
        }

        Ok(())
    }
}

impl SeaOrmStorage {
    /// 去掉 event_ref 已经入库（或本批内重复）的事件
    async fn dedup_by_event_ref(
        &self,
        events: Vec<EngagementEvent>,
    ) -> anyhow::Result<Vec<EngagementEvent>> {
        let refs: Vec<&String> = events.iter().filter_map(|e| e.event_ref.as_ref()).collect();
        if refs.is_empty() {
            return Ok(events);
        }

        let existing: HashSet<String> = EmailEventEntity::find()
            .filter(email_event::Column::EventRef.is_in(refs.iter().map(|s| s.as_str())))
            .all(self.get_db())
            .await?
            .into_iter()
            .filter_map(|row| row.event_ref)
            .collect();

        let mut seen = existing;
        let before = events.len();
        let kept: Vec<EngagementEvent> = events
            .into_iter()
            .filter(|e| match &e.event_ref {
                Some(r) => seen.insert(r.clone()),
                None => true,
            })
            .collect();

        if kept.len() < before {
            debug!("event_ref 去重：{} -> {} 条", before, kept.len());
        }
        Ok(kept)
    }
}

fn event_to_active_model(event: &EngagementEvent) -> email_event::ActiveModel {
    let (link_url, tracking_id, bounce_reason) = match &event.detail {
        EventDetail::Clicked {
            link_url,
            tracking_id,
        } => (Some(link_url.clone()), tracking_id.clone(), None),
        EventDetail::Opened { tracking_id } => (None, tracking_id.clone(), None),
        EventDetail::Bounced { reason } => (None, None, reason.clone()),
        _ => (None, None, None),
    };

    email_event::ActiveModel {
        campaign_id: Set(event.campaign_id.clone()),
        recipient_id: Set(event.recipient_id.clone()),
        event_type: Set(event.kind().as_str().to_string()),
        link_url: Set(link_url),
        tracking_id: Set(tracking_id),
        event_ref: Set(event.event_ref.clone()),
        user_agent: Set(event.user_agent.clone()),
        ip_address: Set(event.ip_address.clone()),
        bounce_reason: Set(bounce_reason),
        created_at: Set(event.occurred_at),
        ..Default::default()
    }
}
