use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use super::{EngagementEvent, EventSink};

/// 事件缓冲管理器
///
/// 按 campaign_id 分片缓冲事件，满足任一条件触发刷盘：
/// - 定时器到期（flush_interval）
/// - 缓冲事件数达到 max_before_flush
///
/// 刷盘失败时把事件放回缓冲，等待下一轮重试。
pub struct EventManager {
    /// campaign_id -> 待落库事件
    buffer: DashMap<String, Vec<EngagementEvent>>,
    /// 缓冲中的事件总数
    pending: AtomicUsize,
    /// 是否已有一次阈值触发的刷盘在途，避免重复 spawn
    flush_scheduled: AtomicBool,
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    max_before_flush: usize,
    flush_interval: Duration,
}

impl EventManager {
    pub fn new(max_before_flush: usize, flush_interval_secs: u64) -> Self {
        Self {
            buffer: DashMap::new(),
            pending: AtomicUsize::new(0),
            flush_scheduled: AtomicBool::new(false),
            sink: RwLock::new(None),
            max_before_flush: max_before_flush.max(1),
            flush_interval: Duration::from_secs(flush_interval_secs.max(1)),
        }
    }

    /// 设置落库后端，启动时调用一次
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        if let Ok(mut guard) = self.sink.write() {
            *guard = Some(sink);
        }
    }

    fn current_sink(&self) -> Option<Arc<dyn EventSink>> {
        self.sink.read().ok().and_then(|guard| guard.clone())
    }

    /// 记录一条事件（只进内存，永不失败）
    pub fn record(self: &Arc<Self>, event: EngagementEvent) {
        let campaign_id = event.campaign_id.clone();
        self.buffer.entry(campaign_id).or_default().push(event);
        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;

        if pending >= self.max_before_flush
            && self
                .flush_scheduled
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            debug!("事件缓冲达到阈值 {}，提前刷盘", self.max_before_flush);
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                manager.flush().await;
                manager.flush_scheduled.store(false, Ordering::Release);
            });
        }
    }

    /// 当前缓冲中的事件数
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// 把缓冲中的全部事件写入 sink
    ///
    /// 失败时整批放回缓冲，等待下一轮
    pub async fn flush(&self) {
        let mut batch: Vec<EngagementEvent> = Vec::new();
        for mut entry in self.buffer.iter_mut() {
            batch.append(entry.value_mut());
        }
        self.buffer.retain(|_, events| !events.is_empty());

        if batch.is_empty() {
            return;
        }
        self.pending.fetch_sub(batch.len(), Ordering::AcqRel);

        let Some(sink) = self.current_sink() else {
            warn!("事件 sink 未设置，丢回缓冲（{} 条）", batch.len());
            self.restore(batch);
            return;
        };

        let count = batch.len();
        match sink.persist_events(batch.clone()).await {
            Ok(()) => {
                debug!("已落库 {} 条互动事件", count);
            }
            Err(e) => {
                error!("事件落库失败（{} 条）：{}，放回缓冲等待重试", count, e);
                self.restore(batch);
            }
        }
    }

    fn restore(&self, events: Vec<EngagementEvent>) {
        let count = events.len();
        for event in events {
            let campaign_id = event.campaign_id.clone();
            self.buffer.entry(campaign_id).or_default().push(event);
        }
        self.pending.fetch_add(count, Ordering::AcqRel);
    }

    /// 启动后台定时刷盘任务
    pub fn start(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let interval = self.flush_interval;
        tokio::spawn(async move {
            info!("事件刷盘任务启动，间隔 {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 第一次 tick 立即返回，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.flush().await;
            }
        });
    }

    /// 停机前的最后一次刷盘
    pub async fn shutdown_flush(&self) {
        if self.pending_count() > 0 {
            info!("停机前刷盘剩余 {} 条事件", self.pending_count());
        }
        self.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::tracking::EventDetail;

    struct MemorySink {
        stored: Mutex<Vec<EngagementEvent>>,
        fail: AtomicBool,
    }

    impl MemorySink {
        fn new() -> Self {
            Self {
                stored: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl EventSink for MemorySink {
        async fn persist_events(&self, events: Vec<EngagementEvent>) -> anyhow::Result<()> {
            if self.fail.load(Ordering::Acquire) {
                anyhow::bail!("injected failure");
            }
            self.stored.lock().unwrap().extend(events);
            Ok(())
        }
    }

    fn open_event(campaign: &str, recipient: &str) -> EngagementEvent {
        EngagementEvent::new(
            campaign.to_string(),
            Some(recipient.to_string()),
            EventDetail::Opened { tracking_id: None },
        )
    }

    #[tokio::test]
    async fn flush_drains_buffer_into_sink() {
        let manager = Arc::new(EventManager::new(1000, 60));
        let sink = Arc::new(MemorySink::new());
        manager.set_sink(sink.clone());

        manager.record(open_event("c1", "r1"));
        manager.record(open_event("c1", "r2"));
        manager.record(open_event("c2", "r1"));
        assert_eq!(manager.pending_count(), 3);

        manager.flush().await;
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(sink.stored.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_flush_restores_events() {
        let manager = Arc::new(EventManager::new(1000, 60));
        let sink = Arc::new(MemorySink::new());
        sink.fail.store(true, Ordering::Release);
        manager.set_sink(sink.clone());

        manager.record(open_event("c1", "r1"));
        manager.flush().await;
        // 失败后事件留在缓冲
        assert_eq!(manager.pending_count(), 1);
        assert!(sink.stored.lock().unwrap().is_empty());

        sink.fail.store(false, Ordering::Release);
        manager.flush().await;
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(sink.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn threshold_triggers_background_flush() {
        let manager = Arc::new(EventManager::new(2, 60));
        let sink = Arc::new(MemorySink::new());
        manager.set_sink(sink.clone());

        manager.record(open_event("c1", "r1"));
        manager.record(open_event("c1", "r2"));

        // 等待 spawn 出来的刷盘完成
        for _ in 0..50 {
            if manager.pending_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(sink.stored.lock().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recording_loses_no_events() {
        let manager = Arc::new(EventManager::new(10, 60));
        let sink = Arc::new(MemorySink::new());
        manager.set_sink(sink.clone());

        let mut handles = Vec::new();
        for task in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    manager.record(open_event(&format!("c{}", task % 3), &format!("r{}", i)));
                    if i % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 收尾刷盘，等在途的阈值刷盘落地
        for _ in 0..100 {
            manager.flush().await;
            if manager.pending_count() == 0 && sink.stored.lock().unwrap().len() == 400 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.stored.lock().unwrap().len(), 400);
    }

    #[tokio::test]
    async fn record_without_sink_keeps_events() {
        let manager = Arc::new(EventManager::new(1000, 60));
        manager.record(open_event("c1", "r1"));
        manager.flush().await;
        assert_eq!(manager.pending_count(), 1);
    }
}
