//! 变更订阅监听
//!
//! 外部变更通知通道的薄适配层：预订或桌台关联集合发生变化时，触发
//! 一次轻量重投影 (不跑修正器/推进器，重活留在定时对账上以约束写入
//! 频率)。事件除了 "有东西变了" 之外没有任何负载保证。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::reconcile::ReconcileScheduler;

/// 发生变更的集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedCollection {
    Reservations,
    Assignments,
}

/// 一条变更通知
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub collection: FeedCollection,
    /// 上游事件类型 ("insert" / "update" / ...)，仅用于日志
    pub event_type: String,
}

/// 变更通知订阅
#[async_trait]
pub trait ChangeFeed: Send + 'static {
    /// 下一条变更通知；`None` 表示订阅已结束
    async fn next_event(&mut self) -> Option<FeedEvent>;
}

/// 进程内通道实现的变更订阅，测试和演示使用
pub struct ChannelFeed {
    rx: mpsc::Receiver<FeedEvent>,
}

/// [`ChannelFeed`] 的生产端
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<FeedEvent>,
}

impl ChannelFeed {
    pub fn new(capacity: usize) -> (FeedHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (FeedHandle { tx }, Self { rx })
    }
}

impl FeedHandle {
    pub async fn notify(&self, collection: FeedCollection, event_type: impl Into<String>) {
        let _ = self
            .tx
            .send(FeedEvent {
                collection,
                event_type: event_type.into(),
            })
            .await;
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn next_event(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }
}

/// 监听循环：变更通知 → 轻量重投影
///
/// 自定义时间模式下挂起 (不触发任何重投影)，订阅结束或收到 shutdown
/// 信号时退出。
pub(crate) async fn run_listener<F: ChangeFeed>(
    scheduler: ReconcileScheduler,
    mut feed: F,
    shutdown: CancellationToken,
) {
    tracing::info!("Change feed listener started");
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = feed.next_event() => match event {
                Some(event) => event,
                None => {
                    tracing::warn!("Change feed closed, listener exiting");
                    break;
                }
            },
        };

        if scheduler.mode().is_custom() {
            tracing::trace!("Custom-time mode, change event ignored");
            continue;
        }

        tracing::debug!(
            collection = ?event.collection,
            event = %event.event_type,
            "Change notification, refreshing projection"
        );
        if let Err(e) = scheduler.refresh_projection().await {
            tracing::warn!(error = %e, "Projection refresh failed, will retry on next event");
        }
    }
    tracing::info!("Change feed listener stopped");
}
