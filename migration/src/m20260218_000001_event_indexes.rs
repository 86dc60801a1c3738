//! 事件表索引迁移
//!
//! 为分析查询与去重检查补充索引。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 活动时间序列查询（engagement series / export）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_email_events_campaign_time")
                    .table(EmailEvents::Table)
                    .col(EmailEvents::CampaignId)
                    .col(EmailEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // webhook 重投递去重检查
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_email_events_event_ref")
                    .table(EmailEvents::Table)
                    .col(EmailEvents::EventRef)
                    .to_owned(),
            )
            .await?;

        // 追踪 ID 审计查询
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_email_events_tracking_id")
                    .table(EmailEvents::Table)
                    .col(EmailEvents::TrackingId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_events_tracking_id")
                    .table(EmailEvents::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_events_event_ref")
                    .table(EmailEvents::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_email_events_campaign_time")
                    .table(EmailEvents::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum EmailEvents {
    #[sea_orm(iden = "email_events")]
    Table,
    CampaignId,
    EventRef,
    TrackingId,
    CreatedAt,
}
