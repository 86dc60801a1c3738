//! Campaign-level rollup counters
//!
//! Derived state: always recomputable by replaying email_events.
//! Counters only ever increase.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "campaign_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub campaign_id: String,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub opened_count: i64,
    /// Opens counted at most once per recipient
    pub unique_opened_count: i64,
    pub clicked_count: i64,
    /// Clicks counted at most once per recipient
    pub unique_clicked_count: i64,
    pub bounced_count: i64,
    pub complained_count: i64,
    pub unsubscribed_count: i64,
    pub last_event_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
