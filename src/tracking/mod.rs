//! 互动事件缓冲与落库
//!
//! 事件从各入口（像素、重定向、webhook、发信 API）进入 [`EventManager`]
//! 的内存缓冲，按时间间隔或数量阈值批量写入 [`EventSink`]。

pub mod manager;
pub mod sink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use manager::EventManager;
pub use sink::EventSink;

/// 事件种类（email_events.event_type 的取值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Sent,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Complained,
    Unsubscribed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Sent => "sent",
            EventKind::Delivered => "delivered",
            EventKind::Opened => "opened",
            EventKind::Clicked => "clicked",
            EventKind::Bounced => "bounced",
            EventKind::Complained => "complained",
            EventKind::Unsubscribed => "unsubscribed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(EventKind::Sent),
            "delivered" => Some(EventKind::Delivered),
            "opened" => Some(EventKind::Opened),
            "clicked" => Some(EventKind::Clicked),
            "bounced" => Some(EventKind::Bounced),
            "complained" => Some(EventKind::Complained),
            "unsubscribed" => Some(EventKind::Unsubscribed),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 按事件种类区分的负载：每个种类只携带自己需要的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetail {
    Sent,
    Delivered,
    Opened {
        #[serde(skip_serializing_if = "Option::is_none")]
        tracking_id: Option<String>,
    },
    Clicked {
        link_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tracking_id: Option<String>,
    },
    Bounced {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Complained,
    Unsubscribed,
}

impl EventDetail {
    pub fn kind(&self) -> EventKind {
        match self {
            EventDetail::Sent => EventKind::Sent,
            EventDetail::Delivered => EventKind::Delivered,
            EventDetail::Opened { .. } => EventKind::Opened,
            EventDetail::Clicked { .. } => EventKind::Clicked,
            EventDetail::Bounced { .. } => EventKind::Bounced,
            EventDetail::Complained => EventKind::Complained,
            EventDetail::Unsubscribed => EventKind::Unsubscribed,
        }
    }
}

/// 一条互动事件，与 email_events 表行一一对应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub campaign_id: String,
    /// webhook 事件在无法解析收件人时为 None
    pub recipient_id: Option<String>,
    pub detail: EventDetail,
    /// 投递服务商分配的事件引用，用于重投去重
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl EngagementEvent {
    pub fn new(campaign_id: String, recipient_id: Option<String>, detail: EventDetail) -> Self {
        Self {
            campaign_id,
            recipient_id,
            detail,
            event_ref: None,
            user_agent: None,
            ip_address: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.detail.kind()
    }

    pub fn with_event_ref(mut self, event_ref: Option<String>) -> Self {
        self.event_ref = event_ref;
        self
    }

    pub fn with_client_info(
        mut self,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        self.user_agent = user_agent;
        self.ip_address = ip_address;
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for kind in [
            EventKind::Sent,
            EventKind::Delivered,
            EventKind::Opened,
            EventKind::Clicked,
            EventKind::Bounced,
            EventKind::Complained,
            EventKind::Unsubscribed,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("forwarded"), None);
    }

    #[test]
    fn detail_kind_matches_variant() {
        let detail = EventDetail::Clicked {
            link_url: "https://example.com/offer".to_string(),
            tracking_id: Some("t-1".to_string()),
        };
        assert_eq!(detail.kind(), EventKind::Clicked);
    }

    #[test]
    fn detail_serializes_tagged() {
        let detail = EventDetail::Bounced {
            reason: Some("mailbox full".to_string()),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "bounced");
        assert_eq!(json["reason"], "mailbox full");
    }
}
