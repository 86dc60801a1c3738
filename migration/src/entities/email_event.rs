//! Immutable engagement event log entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "email_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub campaign_id: String,
    pub recipient_id: Option<String>,
    /// sent / delivered / opened / clicked / bounced / complained / unsubscribed
    pub event_type: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub link_url: Option<String>,
    pub tracking_id: Option<String>,
    /// Provider-assigned delivery reference, used for webhook redelivery dedup
    pub event_ref: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub bounce_reason: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
