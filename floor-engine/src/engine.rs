//! FloorEngine 门面
//!
//! 面向调用方 (UI / 报表层) 的唯一入口，把调度器、变更订阅和后台任务
//! 的装配收拢到一个结构体里。调度器状态由引擎显式持有，没有任何模块
//! 级可变全局。

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::core::{BackgroundTasks, EngineConfig, EngineResult, TaskKind};
use crate::feed::{ChangeFeed, run_listener};
use crate::projection::TableView;
use crate::reconcile::{EngineMode, FloorUpdate, ReconcileScheduler, ReconciliationSnapshot};
use crate::store::ReservationStore;

/// 桌台占用与预订对账引擎
///
/// # 使用示例
///
/// ```ignore
/// let engine = FloorEngine::new(store, EngineConfig::from_env());
/// let mut tasks = BackgroundTasks::new();
/// engine.start_background_tasks(&mut tasks, feed);
///
/// let floor = engine.project_tables(None).await?;
/// let snapshot = engine.run_reconciliation().await?;
/// ```
#[derive(Clone)]
pub struct FloorEngine {
    scheduler: ReconcileScheduler,
}

impl FloorEngine {
    pub fn new(store: Arc<dyn ReservationStore>, config: EngineConfig) -> Self {
        Self {
            scheduler: ReconcileScheduler::new(store, config),
        }
    }

    /// 启动后台任务：对账工作者、定时器、变更订阅监听器
    ///
    /// 必须在使用定时对账/变更订阅之前调用；工作者只能启动一次。
    pub fn start_background_tasks<F: ChangeFeed>(&self, tasks: &mut BackgroundTasks, feed: F) {
        let shutdown = tasks.shutdown_token();

        let worker = self.scheduler.clone();
        let token = shutdown.clone();
        tasks.spawn("reconcile_worker", TaskKind::Worker, async move {
            worker.run_worker(token).await;
        });

        let timer = self.scheduler.clone();
        let token = shutdown.clone();
        tasks.spawn("reconcile_timer", TaskKind::Periodic, async move {
            timer.run_timer(token).await;
        });

        let listener = self.scheduler.clone();
        tasks.spawn("change_feed_listener", TaskKind::Listener, async move {
            run_listener(listener, feed, shutdown).await;
        });
    }

    /// 楼面投影 (纯读取)
    ///
    /// `reference` 为 `None` 时按当前模式取参考时间：live → 墙钟，
    /// custom → 假想时刻。显式给定的参考时间在边界处做合理性校验。
    pub async fn project_tables(&self, reference: Option<i64>) -> EngineResult<Vec<TableView>> {
        let reference = match reference {
            Some(t) => {
                self.scheduler.validate_reference(t)?;
                t
            }
            None => self.scheduler.reference_now(),
        };
        self.scheduler.project_at(reference).await
    }

    /// 手动触发一次完整对账并等待快照
    ///
    /// 已有对账在执行时返回 [`EngineError::PassInProgress`]；自定义
    /// 时间模式下返回 [`EngineError::SimulationMode`]。
    ///
    /// [`EngineError::PassInProgress`]: crate::core::EngineError::PassInProgress
    /// [`EngineError::SimulationMode`]: crate::core::EngineError::SimulationMode
    pub async fn run_reconciliation(&self) -> EngineResult<ReconciliationSnapshot> {
        self.scheduler.request_reconciliation().await
    }

    /// 切换 live / custom 模式 (返回时保证没有在途对账)
    pub async fn set_mode(&self, mode: EngineMode) -> EngineResult<()> {
        self.scheduler.set_mode(mode).await
    }

    pub fn mode(&self) -> EngineMode {
        self.scheduler.mode()
    }

    /// 最近一次对账摘要
    pub fn last_summary(&self) -> Option<ReconciliationSnapshot> {
        self.scheduler.last_summary()
    }

    /// 订阅楼面更新 (重投影 + 对账快照)
    pub fn subscribe(&self) -> broadcast::Receiver<FloorUpdate> {
        self.scheduler.subscribe()
    }
}
