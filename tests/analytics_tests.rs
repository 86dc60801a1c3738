//! 分析读取测试
//!
//! 时间序列分桶、活动报表和导出文档的往返。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use mailbeacon::config::DatabaseConfig;
use mailbeacon::rewriter::Rewriter;
use mailbeacon::services::EngagementService;
use mailbeacon::storage::SeaOrmStorage;
use mailbeacon::storage::backend::ExportDocument;
use mailbeacon::tracking::{EngagementEvent, EventDetail, EventSink};

async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };

    let storage = SeaOrmStorage::new(&config)
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

fn service(storage: &Arc<SeaOrmStorage>) -> EngagementService {
    EngagementService::new(
        Arc::clone(storage),
        Arc::new(Rewriter::new("https://track.example.com")),
    )
}

fn base_time() -> DateTime<Utc> {
    // 对齐到 60 秒边界，方便断言桶时间戳
    DateTime::from_timestamp(1_700_000_040, 0).unwrap()
}

fn opened(campaign: &str, recipient: &str, at: DateTime<Utc>) -> EngagementEvent {
    EngagementEvent::new(
        campaign.to_string(),
        Some(recipient.to_string()),
        EventDetail::Opened { tracking_id: None },
    )
    .with_occurred_at(at)
}

fn clicked(campaign: &str, recipient: &str, url: &str, at: DateTime<Utc>) -> EngagementEvent {
    EngagementEvent::new(
        campaign.to_string(),
        Some(recipient.to_string()),
        EventDetail::Clicked {
            link_url: url.to_string(),
            tracking_id: None,
        },
    )
    .with_occurred_at(at)
}

#[tokio::test]
async fn series_buckets_by_minute() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    storage
        .persist_events(vec![
            opened("camp-1", "alice", t0),
            opened("camp-1", "bob", t0 + Duration::seconds(10)),
            clicked("camp-1", "alice", "https://e.com/a", t0 + Duration::seconds(59)),
            opened("camp-1", "alice", t0 + Duration::seconds(70)),
        ])
        .await
        .unwrap();

    let series = storage.engagement_series("camp-1", 60).await.unwrap();
    assert_eq!(series.len(), 2);

    assert_eq!(series[0].timestamp, t0);
    assert_eq!(series[0].opens, 2);
    assert_eq!(series[0].clicks, 1);
    assert_eq!(series[0].bounces, 0);

    assert_eq!(series[1].timestamp, t0 + Duration::seconds(60));
    assert_eq!(series[1].opens, 1);
    assert_eq!(series[1].clicks, 0);
}

#[tokio::test]
async fn series_skips_buckets_without_engagement() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    storage
        .persist_events(vec![
            EngagementEvent::new("camp-1".to_string(), Some("alice".to_string()), EventDetail::Sent)
                .with_occurred_at(t0),
            opened("camp-1", "alice", t0 + Duration::seconds(600)),
        ])
        .await
        .unwrap();

    // sent 所在的桶没有互动，不应出现
    let series = storage.engagement_series("camp-1", 60).await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].opens, 1);
}

#[tokio::test]
async fn series_is_ascending_and_campaign_scoped() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    storage
        .persist_events(vec![
            opened("camp-1", "alice", t0 + Duration::seconds(120)),
            opened("camp-1", "alice", t0),
            opened("camp-2", "bob", t0 + Duration::seconds(60)),
        ])
        .await
        .unwrap();

    let series = storage.engagement_series("camp-1", 60).await.unwrap();
    assert_eq!(series.len(), 2);
    assert!(series[0].timestamp < series[1].timestamp);
    assert_eq!(series.iter().map(|b| b.opens).sum::<i64>(), 2);
}

#[tokio::test]
async fn export_document_roundtrips_through_json() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    storage
        .persist_events(vec![
            EngagementEvent::new("camp-1".to_string(), Some("alice".to_string()), EventDetail::Sent)
                .with_occurred_at(t0),
            opened("camp-1", "alice", t0 + Duration::seconds(30)),
            clicked("camp-1", "alice", "https://e.com/a", t0 + Duration::seconds(40)),
        ])
        .await
        .unwrap();

    let export = storage.export_campaign("camp-1").await.unwrap();
    let json = serde_json::to_string(&export).unwrap();

    // 文档结构固定
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    for key in [
        "campaign_analytics",
        "recipient_analytics",
        "link_clicks",
        "email_events",
        "exported_at",
    ] {
        assert!(value.get(key).is_some(), "missing key: {}", key);
    }

    // 往返后内容不变
    let parsed: ExportDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.campaign_analytics, export.campaign_analytics);
    assert_eq!(parsed.recipient_analytics, export.recipient_analytics);
    assert_eq!(parsed.link_clicks, export.link_clicks);
    assert_eq!(parsed.email_events, export.email_events);

    let campaign = parsed.campaign_analytics.unwrap();
    assert_eq!(campaign.sent_count, 1);
    assert_eq!(campaign.opened_count, 1);
    assert_eq!(campaign.clicked_count, 1);
    assert_eq!(parsed.email_events.len(), 3);
    assert_eq!(parsed.link_clicks[0].link_url, "https://e.com/a");
}

#[tokio::test]
async fn export_of_unknown_campaign_is_empty() {
    let (storage, _td) = create_temp_storage().await;

    let export = storage.export_campaign("no-such-campaign").await.unwrap();
    assert!(export.campaign_analytics.is_none());
    assert!(export.recipient_analytics.is_empty());
    assert!(export.link_clicks.is_empty());
    assert!(export.email_events.is_empty());
}

#[tokio::test]
async fn campaign_report_combines_all_views() {
    let (storage, _td) = create_temp_storage().await;
    let svc = service(&storage);
    let t0 = base_time();

    storage
        .persist_events(vec![
            opened("camp-1", "alice", t0),
            clicked("camp-1", "bob", "https://e.com/a", t0 + Duration::seconds(5)),
        ])
        .await
        .unwrap();

    let report = svc.campaign_report("camp-1").await.unwrap();
    let campaign = report.campaign.unwrap();
    assert_eq!(campaign.opened_count, 1);
    assert_eq!(campaign.clicked_count, 1);
    assert_eq!(report.recipients.len(), 2);
    assert_eq!(report.links.len(), 1);
}

#[tokio::test]
async fn rewrite_for_send_persists_resolvable_references() {
    let (storage, _td) = create_temp_storage().await;
    let svc = service(&storage);

    let html = r#"<html><body><a href="https://example.com/offer">go</a></body></html>"#;
    let ctx = mailbeacon::rewriter::RewriteContext {
        campaign_id: "camp-1".to_string(),
        recipient_id: "alice".to_string(),
        track_opens: true,
        track_clicks: true,
    };
    let outcome = svc.rewrite_for_send(html, &ctx).await.unwrap();
    assert_eq!(outcome.references.len(), 2);

    // 改写产生的每个引用都能按 tracking_id 解析回来
    for reference in &outcome.references {
        let resolved = storage
            .resolve_tracking_id(&reference.tracking_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.campaign_id, "camp-1");
        assert_eq!(resolved.recipient_id, "alice");
    }
}

#[tokio::test]
async fn rewrite_for_send_rejects_blank_identifiers() {
    let (storage, _td) = create_temp_storage().await;
    let svc = service(&storage);

    let ctx = mailbeacon::rewriter::RewriteContext {
        campaign_id: "  ".to_string(),
        recipient_id: "alice".to_string(),
        track_opens: true,
        track_clicks: true,
    };
    assert!(svc.rewrite_for_send("<p>hi</p>", &ctx).await.is_err());
}
