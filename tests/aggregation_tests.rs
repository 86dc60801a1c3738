//! 汇总层测试
//!
//! 覆盖 apply_event 的计数语义：first/last 时间戳、唯一计数、
//! 顺序无关性、event_ref 去重和从事件日志重建。

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use mailbeacon::config::DatabaseConfig;
use mailbeacon::storage::SeaOrmStorage;
use mailbeacon::storage::backend::apply_event;
use mailbeacon::tracking::{EngagementEvent, EventDetail, EventSink};

/// 创建临时 SQLite 数据库的存储实例
async fn create_temp_storage() -> (SeaOrmStorage, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };

    let storage = SeaOrmStorage::new(&config)
        .await
        .expect("Failed to create storage");

    (storage, temp_dir)
}

fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
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
async fn repeat_opens_increment_total_but_not_unique() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    // 同一收件人打开 5 次
    for i in 0..5 {
        let event = opened("camp-1", "alice", t0 + Duration::seconds(i));
        apply_event(storage.get_db(), &event).await.unwrap();
    }

    let stats = storage
        .get_campaign_analytics("camp-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.opened_count, 5);
    assert_eq!(stats.unique_opened_count, 1);

    let recipients = storage.list_recipient_views("camp-1").await.unwrap();
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].open_count, 5);
}

#[tokio::test]
async fn unique_counts_follow_distinct_recipients() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    for (i, recipient) in ["alice", "bob", "alice", "carol"].iter().enumerate() {
        let event = opened("camp-1", recipient, t0 + Duration::seconds(i as i64));
        apply_event(storage.get_db(), &event).await.unwrap();
    }

    let stats = storage
        .get_campaign_analytics("camp-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.opened_count, 4);
    assert_eq!(stats.unique_opened_count, 3);
}

#[tokio::test]
async fn first_timestamp_takes_earliest_last_takes_latest() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();
    let later = t0 + Duration::minutes(10);

    // 乱序到达：先应用较晚的事件，再应用较早的事件
    apply_event(storage.get_db(), &opened("camp-1", "alice", later))
        .await
        .unwrap();
    apply_event(storage.get_db(), &opened("camp-1", "alice", t0))
        .await
        .unwrap();

    let recipients = storage.list_recipient_views("camp-1").await.unwrap();
    // first_* 收敛到最早的事件时间，last_* 收敛到最晚，与应用顺序无关
    assert_eq!(recipients[0].first_opened_at, Some(t0));
    assert_eq!(recipients[0].last_opened_at, Some(later));

    let stats = storage
        .get_campaign_analytics("camp-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.last_event_at, Some(later));
}

#[tokio::test]
async fn link_first_click_takes_earliest_on_out_of_order_arrival() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();
    let later = t0 + Duration::minutes(10);

    apply_event(
        storage.get_db(),
        &clicked("camp-1", "alice", "https://e.com/a", later),
    )
    .await
    .unwrap();
    apply_event(
        storage.get_db(),
        &clicked("camp-1", "bob", "https://e.com/a", t0),
    )
    .await
    .unwrap();

    let links = storage.list_link_views("camp-1").await.unwrap();
    assert_eq!(links[0].click_count, 2);
    assert_eq!(links[0].first_clicked_at, Some(t0));
    assert_eq!(links[0].last_clicked_at, Some(later));
}

#[tokio::test]
async fn counters_are_order_independent() {
    let t0 = base_time();
    let events = vec![
        opened("camp-1", "alice", t0),
        clicked("camp-1", "alice", "https://e.com/a", t0 + Duration::seconds(5)),
        opened("camp-1", "bob", t0 + Duration::seconds(9)),
        clicked("camp-1", "bob", "https://e.com/a", t0 + Duration::seconds(14)),
        clicked("camp-1", "alice", "https://e.com/b", t0 + Duration::seconds(20)),
        EngagementEvent::new("camp-1".to_string(), Some("carol".to_string()), EventDetail::Sent)
            .with_occurred_at(t0),
    ];

    let (forward, _td1) = create_temp_storage().await;
    for event in &events {
        apply_event(forward.get_db(), event).await.unwrap();
    }

    let (reverse, _td2) = create_temp_storage().await;
    for event in events.iter().rev() {
        apply_event(reverse.get_db(), event).await.unwrap();
    }

    let a = forward.get_campaign_analytics("camp-1").await.unwrap().unwrap();
    let b = reverse.get_campaign_analytics("camp-1").await.unwrap().unwrap();
    assert_eq!(a.sent_count, b.sent_count);
    assert_eq!(a.opened_count, b.opened_count);
    assert_eq!(a.unique_opened_count, b.unique_opened_count);
    assert_eq!(a.clicked_count, b.clicked_count);
    assert_eq!(a.unique_clicked_count, b.unique_clicked_count);
    assert_eq!(a.last_event_at, b.last_event_at);

    // 链接级计数同样与顺序无关
    let links_a = forward.list_link_views("camp-1").await.unwrap();
    let links_b = reverse.list_link_views("camp-1").await.unwrap();
    assert_eq!(links_a, links_b);
    assert_eq!(links_a[0].link_url, "https://e.com/a");
    assert_eq!(links_a[0].click_count, 2);
}

#[tokio::test]
async fn bounce_records_reason_and_timestamp() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    let event = EngagementEvent::new(
        "camp-1".to_string(),
        Some("alice".to_string()),
        EventDetail::Bounced {
            reason: Some("mailbox full".to_string()),
        },
    )
    .with_occurred_at(t0);
    apply_event(storage.get_db(), &event).await.unwrap();

    let stats = storage
        .get_campaign_analytics("camp-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.bounced_count, 1);

    let recipients = storage.list_recipient_views("camp-1").await.unwrap();
    assert_eq!(recipients[0].bounced_at, Some(t0));
    assert_eq!(recipients[0].bounce_reason.as_deref(), Some("mailbox full"));
}

#[tokio::test]
async fn event_without_recipient_skips_recipient_rollup() {
    let (storage, _td) = create_temp_storage().await;

    let event = EngagementEvent::new(
        "camp-1".to_string(),
        None,
        EventDetail::Opened { tracking_id: None },
    );
    apply_event(storage.get_db(), &event).await.unwrap();

    let stats = storage
        .get_campaign_analytics("camp-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.opened_count, 1);
    // 无收件人时不计唯一数，也不建收件人行
    assert_eq!(stats.unique_opened_count, 0);
    assert!(storage.list_recipient_views("camp-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn persist_events_dedups_by_event_ref() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    let event = EngagementEvent::new(
        "camp-1".to_string(),
        Some("alice".to_string()),
        EventDetail::Delivered,
    )
    .with_event_ref(Some("provider-msg-42".to_string()))
    .with_occurred_at(t0);

    // 同批内重复 + 跨批重投
    storage
        .persist_events(vec![event.clone(), event.clone()])
        .await
        .unwrap();
    storage.persist_events(vec![event.clone()]).await.unwrap();

    let stats = storage
        .get_campaign_analytics("camp-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.delivered_count, 1);

    let export = storage.export_campaign("camp-1").await.unwrap();
    assert_eq!(export.email_events.len(), 1);
    assert_eq!(
        export.email_events[0].event_ref.as_deref(),
        Some("provider-msg-42")
    );
}

#[tokio::test]
async fn events_without_ref_are_never_deduped() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    let event = opened("camp-1", "alice", t0);
    storage
        .persist_events(vec![event.clone(), event.clone()])
        .await
        .unwrap();

    let stats = storage
        .get_campaign_analytics("camp-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.opened_count, 2);
}

#[tokio::test]
async fn rebuild_reproduces_live_aggregates() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    let events = vec![
        EngagementEvent::new("camp-1".to_string(), Some("alice".to_string()), EventDetail::Sent)
            .with_occurred_at(t0),
        opened("camp-1", "alice", t0 + Duration::seconds(30)),
        opened("camp-1", "alice", t0 + Duration::seconds(90)),
        clicked("camp-1", "alice", "https://e.com/a", t0 + Duration::seconds(95)),
        opened("camp-1", "bob", t0 + Duration::seconds(120)),
    ];
    storage.persist_events(events).await.unwrap();

    let live_campaign = storage.get_campaign_analytics("camp-1").await.unwrap();
    let live_recipients = storage.list_recipient_views("camp-1").await.unwrap();
    let live_links = storage.list_link_views("camp-1").await.unwrap();

    let replayed = storage.rebuild_campaign("camp-1").await.unwrap();
    assert_eq!(replayed, 5);

    assert_eq!(
        storage.get_campaign_analytics("camp-1").await.unwrap(),
        live_campaign
    );
    assert_eq!(
        storage.list_recipient_views("camp-1").await.unwrap(),
        live_recipients
    );
    assert_eq!(storage.list_link_views("camp-1").await.unwrap(), live_links);
}

#[tokio::test]
async fn rebuild_does_not_touch_other_campaigns() {
    let (storage, _td) = create_temp_storage().await;
    let t0 = base_time();

    storage
        .persist_events(vec![opened("camp-1", "alice", t0), opened("camp-2", "bob", t0)])
        .await
        .unwrap();

    let other_before = storage.get_campaign_analytics("camp-2").await.unwrap();
    storage.rebuild_campaign("camp-1").await.unwrap();
    assert_eq!(
        storage.get_campaign_analytics("camp-2").await.unwrap(),
        other_before
    );
}
