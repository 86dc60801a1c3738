//! 追踪引用读写
//!
//! 改写阶段批量写入，命中阶段按 tracking_id 解析。
//! 写入失败会向调用方返回硬错误：引用没入库的邮件不能按“已追踪”发出。

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use super::SeaOrmStorage;
use super::retry::{self};
use crate::errors::{MailbeaconError, Result};
use crate::rewriter::NewTrackingReference;
use migration::entities::{TrackingReferenceEntity, tracking_reference};

impl SeaOrmStorage {
    /// 批量写入追踪引用
    pub async fn insert_tracking_references(
        &self,
        references: &[NewTrackingReference],
    ) -> Result<()> {
        if references.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let models: Vec<tracking_reference::ActiveModel> = references
            .iter()
            .map(|r| tracking_reference::ActiveModel {
                tracking_id: Set(r.tracking_id.clone()),
                campaign_id: Set(r.campaign_id.clone()),
                recipient_id: Set(r.recipient_id.clone()),
                kind: Set(r.kind.as_str().to_string()),
                target_url: Set(r.target_url.clone()),
                created_at: Set(now),
                ..Default::default()
            })
            .collect();

        retry::with_retry("insert_tracking_references", self.retry_config(), || {
            let models = models.clone();
            async move {
                TrackingReferenceEntity::insert_many(models)
                    .exec_without_returning(self.get_db())
                    .await
            }
        })
        .await
        .map_err(|e| {
            MailbeaconError::tracking_persistence(format!("追踪引用写入失败: {}", e))
        })?;

        Ok(())
    }

    /// 按 tracking_id 解析追踪引用
    pub async fn resolve_tracking_id(
        &self,
        tracking_id: &str,
    ) -> Result<Option<tracking_reference::Model>> {
        let found = TrackingReferenceEntity::find()
            .filter(tracking_reference::Column::TrackingId.eq(tracking_id))
            .one(self.get_db())
            .await?;
        Ok(found)
    }
}
