//! 业务服务层

mod engagement_service;

pub use engagement_service::{CampaignReport, EngagementService};
