//! 对账模块
//!
//! 一次对账 = 一致性修正 → 时间窗推进 → 重新投影 → 与上一份投影做
//! 差分 → 产出 [`ReconciliationSnapshot`]。调度器保证任意时刻至多一次
//! 对账在执行。

pub mod advancer;
pub mod corrector;
pub mod scheduler;

pub use advancer::{AdvanceKind, AdvanceOutcome, run_advancer};
pub use corrector::{CorrectionOutcome, repair_pair, run_corrector};
pub use scheduler::{EngineMode, FloorUpdate, ReconcileScheduler};

use std::time::Duration;

use serde::Serialize;
use shared::models::{LifecycleState, VisitState};

use crate::projection::TableView;
use crate::status::{DeriveFlag, TableStatus};
use crate::store::{ReservationStore, StoreResult};

/// 单个桌台在一次对账前后的状态变化
#[derive(Debug, Clone, Serialize)]
pub struct TableStatusChange {
    pub table_id: i64,
    pub table_name: String,
    pub before: TableStatus,
    pub after: TableStatus,
}

/// 一次对账的结果快照
///
/// 短命的差分产物：保存为 "最近一次对账摘要" 并广播给订阅者，从不
/// 持久化。
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationSnapshot {
    /// 本进程内的对账序号 (从 1 开始)
    pub sequence: u64,
    /// 本次对账使用的参考时间 (Unix millis)
    pub reference_time: i64,
    /// 一致性修正改写过的预订
    pub corrected_ids: Vec<i64>,
    /// 超时自动结账的预订
    pub auto_checkout_ids: Vec<i64>,
    /// 未到店取消的预订
    pub no_show_ids: Vec<i64>,
    /// 因瞬态存储错误跳过、留待下次对账的预订数
    pub skipped: u32,
    /// 重投影时仍观测到的过期 `in_process` 标记数
    pub stale_flags: u32,
    /// 重投影时仍观测到的非法组合标记数
    pub inconsistent_flags: u32,
    /// 对账前后发生状态变化的桌台
    pub status_changes: Vec<TableStatusChange>,
    /// 本次对账耗时 (毫秒)
    pub duration_ms: u64,
}

impl ReconciliationSnapshot {
    pub fn corrections(&self) -> usize {
        self.corrected_ids.len()
    }

    pub fn advances(&self) -> usize {
        self.auto_checkout_ids.len() + self.no_show_ids.len()
    }
}

/// 对账前后的投影差分
///
/// 首次对账没有基线时，以全 `empty` 为基线。
pub fn diff_views(before: &[TableView], after: &[TableView]) -> Vec<TableStatusChange> {
    let previous: std::collections::HashMap<i64, TableStatus> =
        before.iter().map(|v| (v.table.id, v.status)).collect();

    after
        .iter()
        .filter_map(|view| {
            let old = previous
                .get(&view.table.id)
                .copied()
                .unwrap_or(TableStatus::Empty);
            (old != view.status).then(|| TableStatusChange {
                table_id: view.table.id,
                table_name: view.table.name.clone(),
                before: old,
                after: view.status,
            })
        })
        .collect()
}

/// 统计一份投影里的推导异常标记 (stale, inconsistent)
pub(crate) fn count_flags(views: &[TableView]) -> (u32, u32) {
    let mut stale = 0;
    let mut inconsistent = 0;
    for view in views {
        match view.flag {
            Some(DeriveFlag::StaleInProcess) => stale += 1,
            Some(DeriveFlag::Inconsistent) => inconsistent += 1,
            None => {}
        }
    }
    (stale, inconsistent)
}

/// 带重试的状态写入
///
/// 瞬态错误按 `retry_limit` 有限重试，带短退避；其余错误原样返回，
/// 由调用方决定跳过该预订 (单个预订的失败不中止整次对账)。
pub(crate) async fn write_with_retry(
    store: &dyn ReservationStore,
    id: i64,
    lifecycle: LifecycleState,
    visit: VisitState,
    retry_limit: u32,
) -> StoreResult<()> {
    let mut attempt: u32 = 0;
    loop {
        match store.update_reservation_state(id, lifecycle, visit).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < retry_limit => {
                attempt += 1;
                tracing::warn!(
                    reservation = id,
                    attempt,
                    error = %e,
                    "Transient store error, retrying state write"
                );
                tokio::time::sleep(Duration::from_millis(25 * attempt as u64)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
