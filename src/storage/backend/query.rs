//! 分析读取查询
//!
//! 时间序列从事件日志推导（汇总表不保留逐时刻粒度），
//! 其余视图直接读汇总表。全部只读。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use super::SeaOrmStorage;
use crate::errors::Result;
use crate::tracking::EventKind;
use migration::entities::{
    CampaignStatsEntity, EmailEventEntity, LinkStatsEntity, RecipientStatsEntity, campaign_stats,
    email_event, link_stats, recipient_stats,
};

/// 活动级汇总视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignAnalytics {
    pub campaign_id: String,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub opened_count: i64,
    pub unique_opened_count: i64,
    pub clicked_count: i64,
    pub unique_clicked_count: i64,
    pub bounced_count: i64,
    pub complained_count: i64,
    pub unsubscribed_count: i64,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl From<campaign_stats::Model> for CampaignAnalytics {
    fn from(m: campaign_stats::Model) -> Self {
        Self {
            campaign_id: m.campaign_id,
            sent_count: m.sent_count,
            delivered_count: m.delivered_count,
            opened_count: m.opened_count,
            unique_opened_count: m.unique_opened_count,
            clicked_count: m.clicked_count,
            unique_clicked_count: m.unique_clicked_count,
            bounced_count: m.bounced_count,
            complained_count: m.complained_count,
            unsubscribed_count: m.unsubscribed_count,
            last_event_at: m.last_event_at,
        }
    }
}

/// 收件人级平铺视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientView {
    pub recipient_id: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub first_opened_at: Option<DateTime<Utc>>,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub open_count: i64,
    pub first_clicked_at: Option<DateTime<Utc>>,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub click_count: i64,
    pub bounced_at: Option<DateTime<Utc>>,
    pub bounce_reason: Option<String>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

impl From<recipient_stats::Model> for RecipientView {
    fn from(m: recipient_stats::Model) -> Self {
        Self {
            recipient_id: m.recipient_id,
            sent_at: m.sent_at,
            delivered_at: m.delivered_at,
            first_opened_at: m.first_opened_at,
            last_opened_at: m.last_opened_at,
            open_count: m.open_count,
            first_clicked_at: m.first_clicked_at,
            last_clicked_at: m.last_clicked_at,
            click_count: m.click_count,
            bounced_at: m.bounced_at,
            bounce_reason: m.bounce_reason,
            unsubscribed_at: m.unsubscribed_at,
        }
    }
}

/// 链接级点击视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkView {
    pub link_url: String,
    pub click_count: i64,
    pub first_clicked_at: Option<DateTime<Utc>>,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

impl From<link_stats::Model> for LinkView {
    fn from(m: link_stats::Model) -> Self {
        Self {
            link_url: m.link_url,
            click_count: m.click_count,
            first_clicked_at: m.first_clicked_at,
            last_clicked_at: m.last_clicked_at,
        }
    }
}

/// 导出用的事件行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    pub id: i64,
    pub recipient_id: Option<String>,
    pub event_type: String,
    pub link_url: Option<String>,
    pub tracking_id: Option<String>,
    pub event_ref: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub bounce_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<email_event::Model> for EventView {
    fn from(m: email_event::Model) -> Self {
        Self {
            id: m.id,
            recipient_id: m.recipient_id,
            event_type: m.event_type,
            link_url: m.link_url,
            tracking_id: m.tracking_id,
            event_ref: m.event_ref,
            user_agent: m.user_agent,
            ip_address: m.ip_address,
            bounce_reason: m.bounce_reason,
            created_at: m.created_at,
        }
    }
}

/// 时间序列中的一个桶
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesBucket {
    pub timestamp: DateTime<Utc>,
    pub opens: i64,
    pub clicks: i64,
    pub bounces: i64,
    pub complaints: i64,
}

/// 活动导出文档（自包含）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub campaign_analytics: Option<CampaignAnalytics>,
    pub recipient_analytics: Vec<RecipientView>,
    pub link_clicks: Vec<LinkView>,
    pub email_events: Vec<EventView>,
    pub exported_at: DateTime<Utc>,
}

impl SeaOrmStorage {
    pub async fn get_campaign_analytics(
        &self,
        campaign_id: &str,
    ) -> Result<Option<CampaignAnalytics>> {
        let found = CampaignStatsEntity::find_by_id(campaign_id)
            .one(self.get_db())
            .await?;
        Ok(found.map(CampaignAnalytics::from))
    }

    pub async fn list_recipient_views(&self, campaign_id: &str) -> Result<Vec<RecipientView>> {
        let rows = RecipientStatsEntity::find()
            .filter(recipient_stats::Column::CampaignId.eq(campaign_id))
            .order_by_asc(recipient_stats::Column::RecipientId)
            .all(self.get_db())
            .await?;
        Ok(rows.into_iter().map(RecipientView::from).collect())
    }

    pub async fn list_link_views(&self, campaign_id: &str) -> Result<Vec<LinkView>> {
        let rows = LinkStatsEntity::find()
            .filter(link_stats::Column::CampaignId.eq(campaign_id))
            .order_by_desc(link_stats::Column::ClickCount)
            .order_by_asc(link_stats::Column::LinkUrl)
            .all(self.get_db())
            .await?;
        Ok(rows.into_iter().map(LinkView::from).collect())
    }

    /// 从事件日志构建时间序列
    ///
    /// 按 created_at 向下取整到 bucket_secs 分桶，升序返回。
    /// bucket_secs = 1 即按秒（事件的原始粒度）。
    pub async fn engagement_series(
        &self,
        campaign_id: &str,
        bucket_secs: u64,
    ) -> Result<Vec<SeriesBucket>> {
        let bucket_secs = bucket_secs.max(1) as i64;
        let mut buckets: BTreeMap<i64, SeriesBucket> = BTreeMap::new();

        let mut pages = EmailEventEntity::find()
            .filter(email_event::Column::CampaignId.eq(campaign_id))
            .order_by_asc(email_event::Column::CreatedAt)
            .paginate(self.get_db(), 1000);

        while let Some(rows) = pages.fetch_and_next().await? {
            for row in rows {
                let secs = row.created_at.timestamp();
                let floored = secs - secs.rem_euclid(bucket_secs);
                let entry = buckets.entry(floored).or_insert_with(|| SeriesBucket {
                    timestamp: DateTime::from_timestamp(floored, 0).unwrap_or(row.created_at),
                    opens: 0,
                    clicks: 0,
                    bounces: 0,
                    complaints: 0,
                });
                match EventKind::parse(&row.event_type) {
                    Some(EventKind::Opened) => entry.opens += 1,
                    Some(EventKind::Clicked) => entry.clicks += 1,
                    Some(EventKind::Bounced) => entry.bounces += 1,
                    Some(EventKind::Complained) => entry.complaints += 1,
                    _ => {}
                }
            }
        }

        // 只含 sent/delivered 的空桶不输出
        Ok(buckets
            .into_values()
            .filter(|b| b.opens + b.clicks + b.bounces + b.complaints > 0)
            .collect())
    }

    /// 导出一个活动的全部数据
    pub async fn export_campaign(&self, campaign_id: &str) -> Result<ExportDocument> {
        let campaign_analytics = self.get_campaign_analytics(campaign_id).await?;
        let recipient_analytics = self.list_recipient_views(campaign_id).await?;
        let link_clicks = self.list_link_views(campaign_id).await?;

        let email_events = EmailEventEntity::find()
            .filter(email_event::Column::CampaignId.eq(campaign_id))
            .order_by_asc(email_event::Column::CreatedAt)
            .order_by_asc(email_event::Column::Id)
            .all(self.get_db())
            .await?
            .into_iter()
            .map(EventView::from)
            .collect();

        Ok(ExportDocument {
            campaign_analytics,
            recipient_analytics,
            link_clicks,
            email_events,
            exported_at: Utc::now(),
        })
    }
}
