//! Tracking-id to send-context mapping entity
//!
//! Written at send time by the rewriter, read (many times) by the
//! ingest endpoints. Never deleted while the campaign is retained.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tracking_references")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub tracking_id: String,
    pub campaign_id: String,
    pub recipient_id: String,
    /// "pixel" or "link"
    pub kind: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub target_url: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
