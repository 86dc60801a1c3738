//! 互动追踪核心表迁移
//!
//! 创建四张表：
//! - email_events：不可变事件日志（唯一事实来源）
//! - campaign_stats：活动级计数汇总
//! - recipient_stats：收件人级汇总（首次/最近时间戳 + 计数）
//! - link_stats：链接级点击汇总

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 email_events 表
        manager
            .create_table(
                Table::create()
                    .table(EmailEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailEvents::CampaignId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailEvents::RecipientId).string_len(64).null())
                    .col(
                        ColumnDef::new(EmailEvents::EventType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailEvents::LinkUrl).text().null())
                    .col(ColumnDef::new(EmailEvents::TrackingId).string_len(64).null())
                    .col(ColumnDef::new(EmailEvents::EventRef).string_len(128).null())
                    .col(ColumnDef::new(EmailEvents::UserAgent).text().null())
                    .col(ColumnDef::new(EmailEvents::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(EmailEvents::BounceReason).text().null())
                    .col(
                        ColumnDef::new(EmailEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 campaign_stats 表
        manager
            .create_table(
                Table::create()
                    .table(CampaignStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignStats::CampaignId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(counter(CampaignStats::SentCount))
                    .col(counter(CampaignStats::DeliveredCount))
                    .col(counter(CampaignStats::OpenedCount))
                    .col(counter(CampaignStats::UniqueOpenedCount))
                    .col(counter(CampaignStats::ClickedCount))
                    .col(counter(CampaignStats::UniqueClickedCount))
                    .col(counter(CampaignStats::BouncedCount))
                    .col(counter(CampaignStats::ComplainedCount))
                    .col(counter(CampaignStats::UnsubscribedCount))
                    .col(
                        ColumnDef::new(CampaignStats::LastEventAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 recipient_stats 表
        manager
            .create_table(
                Table::create()
                    .table(RecipientStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecipientStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RecipientStats::CampaignId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecipientStats::RecipientId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(nullable_ts(RecipientStats::SentAt))
                    .col(nullable_ts(RecipientStats::DeliveredAt))
                    .col(nullable_ts(RecipientStats::FirstOpenedAt))
                    .col(nullable_ts(RecipientStats::LastOpenedAt))
                    .col(counter(RecipientStats::OpenCount))
                    .col(nullable_ts(RecipientStats::FirstClickedAt))
                    .col(nullable_ts(RecipientStats::LastClickedAt))
                    .col(counter(RecipientStats::ClickCount))
                    .col(nullable_ts(RecipientStats::BouncedAt))
                    .col(ColumnDef::new(RecipientStats::BounceReason).text().null())
                    .col(nullable_ts(RecipientStats::UnsubscribedAt))
                    .to_owned(),
            )
            .await?;

        // (campaign_id, recipient_id) 唯一约束，upsert 依赖此索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_recipient_stats_campaign_recipient")
                    .table(RecipientStats::Table)
                    .col(RecipientStats::CampaignId)
                    .col(RecipientStats::RecipientId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 创建 link_stats 表
        manager
            .create_table(
                Table::create()
                    .table(LinkStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LinkStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LinkStats::CampaignId)
                            .string_len(64)
                            .not_null(),
                    )
                    // MySQL InnoDB 索引键长度限制，链接超长时由写入侧截断
                    .col(ColumnDef::new(LinkStats::LinkUrl).string_len(512).not_null())
                    .col(counter(LinkStats::ClickCount))
                    .col(nullable_ts(LinkStats::FirstClickedAt))
                    .col(nullable_ts(LinkStats::LastClickedAt))
                    .to_owned(),
            )
            .await?;

        // (campaign_id, link_url) 唯一约束，upsert 依赖此索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_link_stats_campaign_url")
                    .table(LinkStats::Table)
                    .col(LinkStats::CampaignId)
                    .col(LinkStats::LinkUrl)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_link_stats_campaign_url")
                    .table(LinkStats::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_recipient_stats_campaign_recipient")
                    .table(RecipientStats::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(LinkStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipientStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CampaignStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmailEvents::Table).to_owned())
            .await
    }
}

/// 计数列：BIGINT NOT NULL DEFAULT 0
fn counter<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .default(0i64)
        .to_owned()
}

/// 可空时间戳列
fn nullable_ts<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .null()
        .to_owned()
}

#[derive(DeriveIden)]
enum EmailEvents {
    #[sea_orm(iden = "email_events")]
    Table,
    Id,
    CampaignId,
    RecipientId,
    EventType,
    LinkUrl,
    TrackingId,
    EventRef,
    UserAgent,
    IpAddress,
    BounceReason,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CampaignStats {
    #[sea_orm(iden = "campaign_stats")]
    Table,
    CampaignId,
    SentCount,
    DeliveredCount,
    OpenedCount,
    UniqueOpenedCount,
    ClickedCount,
    UniqueClickedCount,
    BouncedCount,
    ComplainedCount,
    UnsubscribedCount,
    LastEventAt,
}

#[derive(DeriveIden)]
enum RecipientStats {
    #[sea_orm(iden = "recipient_stats")]
    Table,
    Id,
    CampaignId,
    RecipientId,
    SentAt,
    DeliveredAt,
    FirstOpenedAt,
    LastOpenedAt,
    OpenCount,
    FirstClickedAt,
    LastClickedAt,
    ClickCount,
    BouncedAt,
    BounceReason,
    UnsubscribedAt,
}

#[derive(DeriveIden)]
enum LinkStats {
    #[sea_orm(iden = "link_stats")]
    Table,
    Id,
    CampaignId,
    LinkUrl,
    ClickCount,
    FirstClickedAt,
    LastClickedAt,
}
