//! 汇总表写入
//!
//! 每条事件在一个数据库事务里完成三类汇总的更新：
//!
//! 1. recipient_stats：insert-or-ignore 建行，锁行后在行内判定
//!    “是否该收件人首次 open/click”（活动级 unique 计数依赖这个判定）
//! 2. campaign_stats：原子 upsert，计数用 `count + excluded.count`
//!    表达式累加，last_event_at 单调推进
//! 3. link_stats：点击事件按 (campaign_id, link_url) 原子 upsert
//!
//! 计数从不回退；同一活动不同收件人的事件互不阻塞（不同行），
//! 同一收件人的并发事件靠行锁串行化。

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use tracing::{debug, info, warn};

use super::SeaOrmStorage;
use super::retry;
use crate::errors::{MailbeaconError, Result};
use crate::tracking::{EngagementEvent, EventDetail, EventKind};
use migration::entities::{
    CampaignStatsEntity, EmailEventEntity, LinkStatsEntity, RecipientStatsEntity, campaign_stats,
    email_event, link_stats, recipient_stats,
};

/// link_stats.link_url 的列宽（超长链接写入侧截断）
const LINK_URL_MAX: usize = 512;

/// 收件人行内判定的结果：该收件人是否首次 open / click
#[derive(Debug, Clone, Copy, Default)]
struct Uniqueness {
    first_open: bool,
    first_click: bool,
}

/// 把一条事件应用到三类汇总表（一个事务内）
pub async fn apply_event(db: &DatabaseConnection, event: &EngagementEvent) -> std::result::Result<(), DbErr> {
    let backend = db.get_database_backend();
    let txn = db.begin().await?;

    let uniqueness = apply_recipient(&txn, event).await?;
    apply_campaign(&txn, backend, event, uniqueness).await?;
    apply_link(&txn, backend, event).await?;

    txn.commit().await
}

/// 更新 recipient_stats 并判定 unique 计数
///
/// 行不存在时先 insert-or-ignore 再锁行读取，两个并发事件只会有
/// 一个看到 first_* 为空。无收件人的事件（webhook 未解析）跳过。
async fn apply_recipient<C: ConnectionTrait>(
    txn: &C,
    event: &EngagementEvent,
) -> std::result::Result<Uniqueness, DbErr> {
    let Some(recipient_id) = event.recipient_id.as_deref() else {
        return Ok(Uniqueness::default());
    };

    let blank = recipient_stats::ActiveModel {
        campaign_id: Set(event.campaign_id.clone()),
        recipient_id: Set(recipient_id.to_string()),
        ..Default::default()
    };
    RecipientStatsEntity::insert(blank)
        .on_conflict(
            OnConflict::columns([
                recipient_stats::Column::CampaignId,
                recipient_stats::Column::RecipientId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

    let row = RecipientStatsEntity::find()
        .filter(recipient_stats::Column::CampaignId.eq(&event.campaign_id))
        .filter(recipient_stats::Column::RecipientId.eq(recipient_id))
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| {
            DbErr::RecordNotFound(format!(
                "recipient_stats ({}, {}) 建行后仍未找到",
                event.campaign_id, recipient_id
            ))
        })?;

    let t = event.occurred_at;
    let mut uniqueness = Uniqueness::default();
    let mut changed = false;
    let mut active = row.clone().into_active_model();

    match &event.detail {
        EventDetail::Sent => {
            if rewinds(row.sent_at, t) {
                active.sent_at = Set(Some(t));
                changed = true;
            }
        }
        EventDetail::Delivered => {
            if rewinds(row.delivered_at, t) {
                active.delivered_at = Set(Some(t));
                changed = true;
            }
        }
        EventDetail::Opened { .. } => {
            uniqueness.first_open = row.first_opened_at.is_none();
            active.open_count = Set(row.open_count + 1);
            if rewinds(row.first_opened_at, t) {
                active.first_opened_at = Set(Some(t));
            }
            if advances(row.last_opened_at, t) {
                active.last_opened_at = Set(Some(t));
            }
            changed = true;
        }
        EventDetail::Clicked { .. } => {
            uniqueness.first_click = row.first_clicked_at.is_none();
            active.click_count = Set(row.click_count + 1);
            if rewinds(row.first_clicked_at, t) {
                active.first_clicked_at = Set(Some(t));
            }
            if advances(row.last_clicked_at, t) {
                active.last_clicked_at = Set(Some(t));
            }
            changed = true;
        }
        EventDetail::Bounced { reason } => {
            if rewinds(row.bounced_at, t) {
                active.bounced_at = Set(Some(t));
                active.bounce_reason = Set(reason.clone());
                changed = true;
            }
        }
        EventDetail::Unsubscribed => {
            if rewinds(row.unsubscribed_at, t) {
                active.unsubscribed_at = Set(Some(t));
                changed = true;
            }
        }
        // 投诉只体现在活动级计数
        EventDetail::Complained => {}
    }

    if changed {
        active.update(txn).await?;
    }
    Ok(uniqueness)
}

/// 更新 campaign_stats（原子 upsert）
async fn apply_campaign<C: ConnectionTrait>(
    txn: &C,
    backend: DatabaseBackend,
    event: &EngagementEvent,
    uniqueness: Uniqueness,
) -> std::result::Result<(), DbErr> {
    let kind = event.kind();

    let mut model = campaign_stats::ActiveModel {
        campaign_id: Set(event.campaign_id.clone()),
        sent_count: Set(0),
        delivered_count: Set(0),
        opened_count: Set(0),
        unique_opened_count: Set(0),
        clicked_count: Set(0),
        unique_clicked_count: Set(0),
        bounced_count: Set(0),
        complained_count: Set(0),
        unsubscribed_count: Set(0),
        last_event_at: Set(Some(event.occurred_at)),
    };

    let counter_col = match kind {
        EventKind::Sent => {
            model.sent_count = Set(1);
            campaign_stats::Column::SentCount
        }
        EventKind::Delivered => {
            model.delivered_count = Set(1);
            campaign_stats::Column::DeliveredCount
        }
        EventKind::Opened => {
            model.opened_count = Set(1);
            if uniqueness.first_open {
                model.unique_opened_count = Set(1);
            }
            campaign_stats::Column::OpenedCount
        }
        EventKind::Clicked => {
            model.clicked_count = Set(1);
            if uniqueness.first_click {
                model.unique_clicked_count = Set(1);
            }
            campaign_stats::Column::ClickedCount
        }
        EventKind::Bounced => {
            model.bounced_count = Set(1);
            campaign_stats::Column::BouncedCount
        }
        EventKind::Complained => {
            model.complained_count = Set(1);
            campaign_stats::Column::ComplainedCount
        }
        EventKind::Unsubscribed => {
            model.unsubscribed_count = Set(1);
            campaign_stats::Column::UnsubscribedCount
        }
    };

    let mut on_conflict = OnConflict::column(campaign_stats::Column::CampaignId).to_owned();
    add_counter(&mut on_conflict, backend, counter_col);
    if uniqueness.first_open {
        add_counter(
            &mut on_conflict,
            backend,
            campaign_stats::Column::UniqueOpenedCount,
        );
    }
    if uniqueness.first_click {
        add_counter(
            &mut on_conflict,
            backend,
            campaign_stats::Column::UniqueClickedCount,
        );
    }
    on_conflict.value(
        campaign_stats::Column::LastEventAt,
        monotonic_max(backend, "campaign_stats", "last_event_at"),
    );

    CampaignStatsEntity::insert(model)
        .on_conflict(on_conflict)
        .exec_without_returning(txn)
        .await?;

    Ok(())
}

/// 更新 link_stats（仅点击事件，原子 upsert）
async fn apply_link<C: ConnectionTrait>(
    txn: &C,
    backend: DatabaseBackend,
    event: &EngagementEvent,
) -> std::result::Result<(), DbErr> {
    let EventDetail::Clicked { link_url, .. } = &event.detail else {
        return Ok(());
    };

    let link_url = truncate_link(link_url);

    let model = link_stats::ActiveModel {
        campaign_id: Set(event.campaign_id.clone()),
        link_url: Set(link_url),
        click_count: Set(1),
        first_clicked_at: Set(Some(event.occurred_at)),
        last_clicked_at: Set(Some(event.occurred_at)),
        ..Default::default()
    };

    let mut on_conflict = OnConflict::columns([
        link_stats::Column::CampaignId,
        link_stats::Column::LinkUrl,
    ])
    .to_owned();
    add_counter(&mut on_conflict, backend, link_stats::Column::ClickCount);
    on_conflict
        .value(
            link_stats::Column::FirstClickedAt,
            monotonic_min(backend, "link_stats", "first_clicked_at"),
        )
        .value(
            link_stats::Column::LastClickedAt,
            monotonic_max(backend, "link_stats", "last_clicked_at"),
        );

    LinkStatsEntity::insert(model)
        .on_conflict(on_conflict)
        .exec_without_returning(txn)
        .await?;

    Ok(())
}

/// last_* 只允许前进：已有值更新时取较大者
fn advances(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> bool {
    current.is_none_or(|c| candidate > c)
}

/// first_* 只允许后退：乱序到达的更早事件可以回填
fn rewinds(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> bool {
    current.is_none_or(|c| candidate < c)
}

/// `col = col + excluded.col`（MySQL 为 `VALUES(col)`）
fn add_counter<T: ColumnTrait>(on_conflict: &mut OnConflict, backend: DatabaseBackend, col: T) {
    let name = col.as_str();
    on_conflict.value(col, Expr::col(col).add(incoming(backend, name)));
}

/// 冲突更新里引用“新插入值”的表达式
fn incoming(backend: DatabaseBackend, col_name: &str) -> SimpleExpr {
    match backend {
        DatabaseBackend::MySql => Expr::cust(format!("VALUES({})", col_name)),
        _ => Expr::cust(format!("excluded.{}", col_name)),
    }
}

/// `first_*` 单调回退：新值更早才覆盖（乱序到达时收敛到最早）
fn monotonic_min(backend: DatabaseBackend, table: &str, col_name: &str) -> SimpleExpr {
    match backend {
        DatabaseBackend::MySql => Expr::cust(format!(
            "CASE WHEN {col} IS NULL OR VALUES({col}) < {col} THEN VALUES({col}) ELSE {col} END",
            col = col_name
        )),
        _ => Expr::cust(format!(
            "CASE WHEN {table}.{col} IS NULL OR excluded.{col} < {table}.{col} \
             THEN excluded.{col} ELSE {table}.{col} END",
            table = table,
            col = col_name
        )),
    }
}

/// `last_*` 单调推进：新值更大才覆盖
fn monotonic_max(backend: DatabaseBackend, table: &str, col_name: &str) -> SimpleExpr {
    match backend {
        DatabaseBackend::MySql => Expr::cust(format!(
            "CASE WHEN {col} IS NULL OR VALUES({col}) > {col} THEN VALUES({col}) ELSE {col} END",
            col = col_name
        )),
        _ => Expr::cust(format!(
            "CASE WHEN {table}.{col} IS NULL OR excluded.{col} > {table}.{col} \
             THEN excluded.{col} ELSE {table}.{col} END",
            table = table,
            col = col_name
        )),
    }
}

/// 截断到列宽（落在字符边界上）
fn truncate_link(url: &str) -> String {
    if url.len() <= LINK_URL_MAX {
        return url.to_string();
    }
    let mut end = LINK_URL_MAX;
    while !url.is_char_boundary(end) {
        end -= 1;
    }
    url[..end].to_string()
}

/// 从事件日志行还原事件（replay 用）
pub(crate) fn event_from_row(row: &email_event::Model) -> Option<EngagementEvent> {
    let kind = EventKind::parse(&row.event_type)?;
    let detail = match kind {
        EventKind::Sent => EventDetail::Sent,
        EventKind::Delivered => EventDetail::Delivered,
        EventKind::Opened => EventDetail::Opened {
            tracking_id: row.tracking_id.clone(),
        },
        EventKind::Clicked => EventDetail::Clicked {
            link_url: row.link_url.clone()?,
            tracking_id: row.tracking_id.clone(),
        },
        EventKind::Bounced => EventDetail::Bounced {
            reason: row.bounce_reason.clone(),
        },
        EventKind::Complained => EventDetail::Complained,
        EventKind::Unsubscribed => EventDetail::Unsubscribed,
    };

    Some(EngagementEvent {
        campaign_id: row.campaign_id.clone(),
        recipient_id: row.recipient_id.clone(),
        detail,
        event_ref: row.event_ref.clone(),
        user_agent: row.user_agent.clone(),
        ip_address: row.ip_address.clone(),
        occurred_at: row.created_at,
    })
}

impl SeaOrmStorage {
    /// 重建一个活动的全部汇总
    ///
    /// 删除三类汇总后按 created_at 顺序重放事件日志。
    /// 不与新事件的写入互斥：重放期间进来的事件照常应用，
    /// 结果仍收敛（事件日志是唯一事实来源）。
    pub async fn rebuild_campaign(&self, campaign_id: &str) -> Result<u64> {
        let db = self.get_db();

        CampaignStatsEntity::delete_many()
            .filter(campaign_stats::Column::CampaignId.eq(campaign_id))
            .exec(db)
            .await?;
        RecipientStatsEntity::delete_many()
            .filter(recipient_stats::Column::CampaignId.eq(campaign_id))
            .exec(db)
            .await?;
        LinkStatsEntity::delete_many()
            .filter(link_stats::Column::CampaignId.eq(campaign_id))
            .exec(db)
            .await?;

        let mut applied: u64 = 0;
        let mut pages = EmailEventEntity::find()
            .filter(email_event::Column::CampaignId.eq(campaign_id))
            .order_by_asc(email_event::Column::CreatedAt)
            .order_by_asc(email_event::Column::Id)
            .paginate(db, 500);

        while let Some(rows) = pages.fetch_and_next().await? {
            for row in &rows {
                let Some(event) = event_from_row(row) else {
                    warn!("事件 {} 的类型 '{}' 无法识别，跳过", row.id, row.event_type);
                    continue;
                };
                retry::with_retry("rebuild_apply_event", self.retry_config(), || async {
                    apply_event(db, &event).await
                })
                .await
                .map_err(|e| {
                    MailbeaconError::database_operation(format!(
                        "重放事件 {} 失败: {}",
                        row.id, e
                    ))
                })?;
                applied += 1;
            }
            debug!("活动 {} 已重放 {} 条事件", campaign_id, applied);
        }

        info!("活动 {} 汇总重建完成，共 {} 条事件", campaign_id, applied);
        Ok(applied)
    }
}
