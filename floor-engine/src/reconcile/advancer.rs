//! 时间窗推进器
//!
//! 扫描活跃 (`in_order`) 预订，按策略推进过期时间窗的生命周期状态：
//! 超时用餐自动结账、过点未到自动取消。这是员工显式操作之外唯一
//! 会改写 lifecycle/visit 的组件，绝不触碰已结束的预订。

use shared::models::{LifecycleState, Reservation, VisitState};

use super::write_with_retry;
use crate::core::ReservationPolicy;
use crate::store::{ReservationStore, StoreResult};

/// 推进类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceKind {
    /// 用餐超过时间窗 → `(completed, visited)`，释放桌台
    AutoCheckout,
    /// 过点未签到 → `(cancelled, un_visited)`
    NoShow,
}

/// 一次推进扫描的结果
#[derive(Debug, Default)]
pub struct AdvanceOutcome {
    pub auto_checkout_ids: Vec<i64>,
    pub no_show_ids: Vec<i64>,
    /// 重试耗尽后跳过的预订数
    pub skipped: u32,
}

/// 判定一个活跃预订在参考时间下应当推进到的状态
///
/// 阈值与状态推导共用 [`ReservationPolicy`]：30 分钟用餐窗和 5 分钟
/// 迟到宽限是同一份策略的写入视角。
pub fn plan_advance(
    reservation: &Reservation,
    reference_ms: i64,
    policy: &ReservationPolicy,
) -> Option<(LifecycleState, VisitState, AdvanceKind)> {
    if !reservation.is_active() {
        return None;
    }

    let elapsed = reference_ms - reservation.scheduled_time;
    match reservation.visit {
        VisitState::InProcess if elapsed > policy.dine_window_ms() => Some((
            LifecycleState::Completed,
            VisitState::Visited,
            AdvanceKind::AutoCheckout,
        )),
        VisitState::UnVisited if elapsed > policy.late_grace_ms() => Some((
            LifecycleState::Cancelled,
            VisitState::UnVisited,
            AdvanceKind::NoShow,
        )),
        _ => None,
    }
}

/// 对活跃预订执行一次推进扫描
pub async fn run_advancer(
    store: &dyn ReservationStore,
    reference_ms: i64,
    policy: &ReservationPolicy,
    retry_limit: u32,
) -> StoreResult<AdvanceOutcome> {
    let reservations = store.list_active_reservations().await?;
    let mut outcome = AdvanceOutcome::default();

    for reservation in &reservations {
        let Some((lifecycle, visit, kind)) = plan_advance(reservation, reference_ms, policy)
        else {
            continue;
        };

        match write_with_retry(store, reservation.id, lifecycle, visit, retry_limit).await {
            Ok(()) => {
                tracing::info!(
                    reservation = reservation.id,
                    customer = %reservation.customer_name,
                    kind = ?kind,
                    "Advanced expired reservation window"
                );
                match kind {
                    AdvanceKind::AutoCheckout => outcome.auto_checkout_ids.push(reservation.id),
                    AdvanceKind::NoShow => outcome.no_show_ids.push(reservation.id),
                }
            }
            Err(e) => {
                tracing::error!(
                    reservation = reservation.id,
                    error = %e,
                    "Skipping window advance for this pass"
                );
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}
