//! 互动分析服务
//!
//! API 层与存储之间的薄封装：发送改写（含引用入库的硬失败语义）、
//! 活动报表、时间序列、导出、汇总重建。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{MailbeaconError, Result};
use crate::rewriter::{RewriteContext, RewriteOutcome, Rewriter};
use crate::storage::SeaOrmStorage;
use crate::storage::backend::{CampaignAnalytics, ExportDocument, LinkView, RecipientView, SeriesBucket};

/// 活动报表：活动级汇总 + 收件人平铺 + 链接点击
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub campaign: Option<CampaignAnalytics>,
    pub recipients: Vec<RecipientView>,
    pub links: Vec<LinkView>,
}

#[derive(Clone)]
pub struct EngagementService {
    storage: Arc<SeaOrmStorage>,
    rewriter: Arc<Rewriter>,
}

impl EngagementService {
    pub fn new(storage: Arc<SeaOrmStorage>, rewriter: Arc<Rewriter>) -> Self {
        Self { storage, rewriter }
    }

    /// 发送侧改写
    ///
    /// 追踪引用必须先于邮件发出入库；入库失败整个调用失败，
    /// 调用方不得把未追踪的正文当作“已追踪”发出。
    pub async fn rewrite_for_send(
        &self,
        html_body: &str,
        ctx: &RewriteContext,
    ) -> Result<RewriteOutcome> {
        if ctx.campaign_id.trim().is_empty() || ctx.recipient_id.trim().is_empty() {
            return Err(MailbeaconError::validation(
                "campaign_id 和 recipient_id 不能为空",
            ));
        }

        let outcome = self.rewriter.rewrite(html_body, ctx);
        self.storage
            .insert_tracking_references(&outcome.references)
            .await?;

        info!(
            "活动 {} 收件人 {} 改写完成：{} 个追踪引用",
            ctx.campaign_id,
            ctx.recipient_id,
            outcome.references.len()
        );
        Ok(outcome)
    }

    /// 活动报表（汇总 + 收件人 + 链接）
    pub async fn campaign_report(&self, campaign_id: &str) -> Result<CampaignReport> {
        Ok(CampaignReport {
            campaign: self.storage.get_campaign_analytics(campaign_id).await?,
            recipients: self.storage.list_recipient_views(campaign_id).await?,
            links: self.storage.list_link_views(campaign_id).await?,
        })
    }

    /// 互动时间序列
    pub async fn engagement_series(
        &self,
        campaign_id: &str,
        bucket_secs: u64,
    ) -> Result<Vec<SeriesBucket>> {
        self.storage.engagement_series(campaign_id, bucket_secs).await
    }

    /// 活动导出文档
    pub async fn export_campaign(&self, campaign_id: &str) -> Result<ExportDocument> {
        self.storage.export_campaign(campaign_id).await
    }

    /// 从事件日志重建活动汇总，返回重放的事件数
    pub async fn rebuild_campaign(&self, campaign_id: &str) -> Result<u64> {
        self.storage.rebuild_campaign(campaign_id).await
    }
}
