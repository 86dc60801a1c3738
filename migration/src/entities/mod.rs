pub mod campaign_stats;
pub mod email_event;
pub mod link_stats;
pub mod recipient_stats;
pub mod tracking_reference;

pub use campaign_stats::Entity as CampaignStatsEntity;
pub use email_event::Entity as EmailEventEntity;
pub use link_stats::Entity as LinkStatsEntity;
pub use recipient_stats::Entity as RecipientStatsEntity;
pub use tracking_reference::Entity as TrackingReferenceEntity;
