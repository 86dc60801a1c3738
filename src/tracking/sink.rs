use async_trait::async_trait;

use super::EngagementEvent;

/// 事件落库接口
///
/// [`EventManager`](super::EventManager) 批量调用 `persist_events`，
/// 实现方负责写入事件日志并更新汇总表。失败时整批返回错误，
/// 由调用方决定是否放回缓冲。
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn persist_events(&self, events: Vec<EngagementEvent>) -> anyhow::Result<()>;
}
