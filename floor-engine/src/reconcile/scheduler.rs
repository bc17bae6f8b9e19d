//! 对账调度器
//!
//! # 架构
//!
//! ```text
//! 定时器 ─┐
//! 手动触发 ─┼─▶ bounded(1) 信号通道 ─▶ 对账工作者 (唯一消费者)
//! (变更订阅只触发轻量重投影，不进入此通道)
//! ```
//!
//! 三个触发源只会向通道投递 "run" 信号；工作者是唯一的状态修改者，
//! 天然串行，保证任意时刻至多一次对账在执行。对账执行期间：定时器
//! 触发被丢弃，手动触发得到 [`EngineError::PassInProgress`]。
//!
//! # 模式
//!
//! `live` 模式下定时器与变更订阅正常驱动；`custom` (what-if) 模式下
//! 两者完全挂起，投影退化为指定时刻的纯读取，任何对账请求都被拒绝
//! —— 用假想时间推进真实数据会破坏数据模型。模式切换先取得 pass
//! gate (工作者在对账全程持有)，因此 `set_mode` 返回时保证没有在途
//! 对账会在模拟模式下落盘。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::Serialize;
use shared::util::now_millis;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{ReconciliationSnapshot, count_flags, diff_views};
use crate::core::{EngineConfig, EngineError, EngineResult};
use crate::projection::{TableView, project};
use crate::reconcile::{run_advancer, run_corrector};
use crate::store::ReservationStore;

/// 楼面更新广播通道容量
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// 引擎运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EngineMode {
    /// 实时模式：墙钟参考时间，定时对账 + 变更订阅
    Live,
    /// 自定义时间 (what-if) 模式：纯读取，禁止一切写入
    Custom { reference_time: i64 },
}

impl EngineMode {
    pub fn is_live(&self) -> bool {
        matches!(self, EngineMode::Live)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, EngineMode::Custom { .. })
    }
}

/// 广播给 UI/订阅方的楼面更新
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FloorUpdate {
    /// 轻量重投影 (变更订阅触发)
    Projection {
        reference_time: i64,
        views: Vec<TableView>,
    },
    /// 一次完整对账的结果
    Reconciled { snapshot: ReconciliationSnapshot },
}

/// 投递给工作者的对账信号
struct RunSignal {
    /// 手动触发时的回执通道；定时器触发为 None
    reply: Option<oneshot::Sender<EngineResult<ReconciliationSnapshot>>>,
}

struct SchedulerInner {
    store: Arc<dyn ReservationStore>,
    config: EngineConfig,
    mode: RwLock<EngineMode>,
    /// 对账全程由工作者持有；`set_mode` 借它等待在途对账结束
    pass_gate: Mutex<()>,
    /// 去重标志：触发源置位，工作者完成后清零
    in_flight: AtomicBool,
    /// 上一份投影，作为差分基线
    last_projection: RwLock<Vec<TableView>>,
    last_snapshot: RwLock<Option<ReconciliationSnapshot>>,
    sequence: AtomicU64,
    update_tx: broadcast::Sender<FloorUpdate>,
    /// 工作者接收端，启动时取走
    run_rx: SyncMutex<Option<mpsc::Receiver<RunSignal>>>,
    /// 进程时代标识，订阅方用于识别引擎重启
    epoch: String,
}

/// 对账调度器
///
/// `Clone` 共享同一内部状态，可以廉价地分发给定时器、监听器和门面。
#[derive(Clone)]
pub struct ReconcileScheduler {
    inner: Arc<SchedulerInner>,
    run_tx: mpsc::Sender<RunSignal>,
}

impl ReconcileScheduler {
    pub fn new(store: Arc<dyn ReservationStore>, config: EngineConfig) -> Self {
        let (run_tx, run_rx) = mpsc::channel(1);
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let epoch = uuid::Uuid::new_v4().to_string();
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                config,
                mode: RwLock::new(EngineMode::Live),
                pass_gate: Mutex::new(()),
                in_flight: AtomicBool::new(false),
                last_projection: RwLock::new(Vec::new()),
                last_snapshot: RwLock::new(None),
                sequence: AtomicU64::new(0),
                update_tx,
                run_rx: SyncMutex::new(Some(run_rx)),
                epoch,
            }),
            run_tx,
        }
    }

    // ========================================================================
    // Read API
    // ========================================================================

    pub fn mode(&self) -> EngineMode {
        *self.inner.mode.read()
    }

    pub fn last_summary(&self) -> Option<ReconciliationSnapshot> {
        self.inner.last_snapshot.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FloorUpdate> {
        self.inner.update_tx.subscribe()
    }

    /// 当前模式下的参考时间：live → 墙钟，custom → 假想时刻
    pub fn reference_now(&self) -> i64 {
        match self.mode() {
            EngineMode::Live => now_millis(),
            EngineMode::Custom { reference_time } => reference_time,
        }
    }

    /// 参考时间合理性校验 (API 边界)
    pub fn validate_reference(&self, reference: i64) -> EngineResult<()> {
        let skew = (reference - now_millis()).abs();
        if skew > self.inner.config.max_reference_skew_ms() {
            return Err(EngineError::InvalidReferenceTime {
                reference,
                bound_days: self.inner.config.max_reference_skew_days,
            });
        }
        Ok(())
    }

    /// 在给定参考时间下计算楼面投影 (纯读取，不触碰差分基线)
    pub async fn project_at(&self, reference_ms: i64) -> EngineResult<Vec<TableView>> {
        let tables = self.inner.store.list_tables().await?;
        let reservations = self.inner.store.list_active_reservations().await?;
        let ids: Vec<i64> = reservations.iter().map(|r| r.id).collect();
        let assignments = self.inner.store.list_table_assignments(&ids).await?;
        Ok(project(
            &tables,
            &reservations,
            &assignments,
            reference_ms,
            &self.inner.config.policy,
        ))
    }

    // ========================================================================
    // Mode
    // ========================================================================

    /// 切换 live / custom 模式
    ///
    /// 取得 pass gate 后才落位：返回时保证没有在途对账，之后的定时器
    /// 和变更订阅触发都会看到新模式并挂起。
    pub async fn set_mode(&self, mode: EngineMode) -> EngineResult<()> {
        if let EngineMode::Custom { reference_time } = mode {
            self.validate_reference(reference_time)?;
        }

        let _gate = self.inner.pass_gate.lock().await;
        let previous = {
            let mut current = self.inner.mode.write();
            std::mem::replace(&mut *current, mode)
        };
        if previous != mode {
            tracing::info!(from = ?previous, to = ?mode, "Engine mode switched");
        }
        Ok(())
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// 手动触发一次对账并等待结果
    pub async fn request_reconciliation(&self) -> EngineResult<ReconciliationSnapshot> {
        if self.mode().is_custom() {
            return Err(EngineError::SimulationMode);
        }
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::PassInProgress);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .run_tx
            .send(RunSignal {
                reply: Some(reply_tx),
            })
            .await
            .is_err()
        {
            self.inner.in_flight.store(false, Ordering::SeqCst);
            return Err(EngineError::Shutdown);
        }
        reply_rx.await.map_err(|_| EngineError::Shutdown)?
    }

    /// 定时器触发：执行中则丢弃本次触发
    async fn trigger_from_timer(&self) {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Reconciliation pass in progress, timer trigger dropped");
            return;
        }
        if self.run_tx.send(RunSignal { reply: None }).await.is_err() {
            self.inner.in_flight.store(false, Ordering::SeqCst);
        }
    }

    /// 变更订阅触发的轻量重投影 (不跑修正器/推进器)
    ///
    /// 更新差分基线并广播给订阅方。
    pub async fn refresh_projection(&self) -> EngineResult<Vec<TableView>> {
        let reference = self.reference_now();
        let views = self.project_at(reference).await?;
        *self.inner.last_projection.write() = views.clone();
        let _ = self.inner.update_tx.send(FloorUpdate::Projection {
            reference_time: reference,
            views: views.clone(),
        });
        Ok(views)
    }

    // ========================================================================
    // Background loops
    // ========================================================================

    /// 对账工作者主循环 (唯一消费者，只能启动一次)
    pub async fn run_worker(&self, shutdown: CancellationToken) {
        let Some(mut run_rx) = self.inner.run_rx.lock().take() else {
            tracing::error!("Reconcile worker already started, refusing second instance");
            return;
        };
        tracing::info!(epoch = %self.inner.epoch, "Reconcile worker started");

        loop {
            let signal = tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = run_rx.recv() => match signal {
                    Some(signal) => signal,
                    None => break,
                },
            };
            self.execute(signal).await;
        }

        tracing::info!("Reconcile worker stopped");
    }

    /// 定时触发循环
    pub async fn run_timer(&self, shutdown: CancellationToken) {
        let period = Duration::from_secs(self.inner.config.reconcile_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // 首个 tick 立即完成，跳过

        tracing::info!(period_secs = period.as_secs(), "Reconcile timer started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Reconcile timer stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            if self.mode().is_custom() {
                tracing::trace!("Custom-time mode, timer tick suspended");
                continue;
            }
            self.trigger_from_timer().await;
        }
    }

    // ========================================================================
    // Pass execution
    // ========================================================================

    async fn execute(&self, signal: RunSignal) {
        let result = {
            let _gate = self.inner.pass_gate.lock().await;
            // 信号入队后模式可能已切换，落锁后复核
            let mode = *self.inner.mode.read();
            match mode {
                EngineMode::Custom { .. } => Err(EngineError::SimulationMode),
                EngineMode::Live => self.run_pass(now_millis()).await,
            }
        };
        self.inner.in_flight.store(false, Ordering::SeqCst);

        match signal.reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = result {
                    match e {
                        EngineError::SimulationMode => {
                            tracing::debug!("Timer signal discarded after mode switch")
                        }
                        _ => tracing::error!(error = %e, "Timer-triggered reconciliation failed"),
                    }
                }
            }
        }
    }

    /// 一次完整对账：修正 → 推进 → 重投影 → 差分
    async fn run_pass(&self, reference_ms: i64) -> EngineResult<ReconciliationSnapshot> {
        let started = std::time::Instant::now();
        let store = self.inner.store.as_ref();
        let retry_limit = self.inner.config.write_retry_limit;

        let before = self.inner.last_projection.read().clone();

        let correction = run_corrector(store, retry_limit).await?;
        let advance = run_advancer(store, reference_ms, &self.inner.config.policy, retry_limit)
            .await?;

        let after = self.project_at(reference_ms).await?;
        let status_changes = diff_views(&before, &after);
        let (stale_flags, inconsistent_flags) = count_flags(&after);

        let snapshot = ReconciliationSnapshot {
            sequence: self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            reference_time: reference_ms,
            corrected_ids: correction.corrected_ids,
            auto_checkout_ids: advance.auto_checkout_ids,
            no_show_ids: advance.no_show_ids,
            skipped: correction.skipped + advance.skipped,
            stale_flags,
            inconsistent_flags,
            status_changes,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        *self.inner.last_projection.write() = after;
        *self.inner.last_snapshot.write() = Some(snapshot.clone());
        let _ = self.inner.update_tx.send(FloorUpdate::Reconciled {
            snapshot: snapshot.clone(),
        });

        tracing::info!(
            sequence = snapshot.sequence,
            corrections = snapshot.corrections(),
            auto_checkouts = snapshot.auto_checkout_ids.len(),
            no_shows = snapshot.no_show_ids.len(),
            skipped = snapshot.skipped,
            changed_tables = snapshot.status_changes.len(),
            duration_ms = snapshot.duration_ms,
            "Reconciliation pass complete"
        );

        Ok(snapshot)
    }
}
