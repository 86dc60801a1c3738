//! 追踪引用表迁移
//!
//! tracking_references 保存发信时生成的追踪 ID 与
//! (campaign, recipient, kind, target_url) 的映射，
//! 像素与重定向端点据此解析事件上下文。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TrackingReferences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackingReferences::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TrackingReferences::TrackingId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackingReferences::CampaignId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackingReferences::RecipientId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackingReferences::Kind)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackingReferences::TargetUrl).text().null())
                    .col(
                        ColumnDef::new(TrackingReferences::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // tracking_id 唯一索引（解析路径的主查询）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracking_references_tracking_id")
                    .table(TrackingReferences::Table)
                    .col(TrackingReferences::TrackingId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_tracking_references_tracking_id")
                    .table(TrackingReferences::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(TrackingReferences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TrackingReferences {
    #[sea_orm(iden = "tracking_references")]
    Table,
    Id,
    TrackingId,
    CampaignId,
    RecipientId,
    Kind,
    TargetUrl,
    CreatedAt,
}
