//! 桌台状态推导
//!
//! 纯函数：`(预订, 参考时间) → 桌台状态`。无 I/O、无副作用，可以在
//! 任意调用方并发执行，也可以用任意假想时刻做 what-if 推演。
//!
//! 推导永远不修正数据：过期的 `in_process` 在这里只降级为 `empty`
//! 显示兜底，真正的状态推进由时间窗推进器完成。

use serde::{Deserialize, Serialize};
use shared::models::{LifecycleState, Reservation, VisitState};

use crate::core::ReservationPolicy;

/// 桌台显示状态（仅存在于单次投影的内存里，从不持久化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// 空闲
    Empty,
    /// 预订临近 (0 < lead ≤ lookahead)
    Reserved,
    /// 到点待签到 (迟到宽限窗口内)
    Ready,
    /// 用餐中
    Occupied,
}

/// 推导过程中发现的数据异常标记
///
/// 不是错误：只计数、记日志，出现在对账快照里。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeriveFlag {
    /// `in_process` 已超过用餐时间窗，应当早已被推进器自动结账
    StaleInProcess,
    /// 非法的 (lifecycle, visit) 组合，如 `(in_order, visited)`
    Inconsistent,
}

/// 推导结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub status: TableStatus,
    pub flag: Option<DeriveFlag>,
}

impl Derived {
    fn plain(status: TableStatus) -> Self {
        Self { status, flag: None }
    }

    fn flagged(status: TableStatus, flag: DeriveFlag) -> Self {
        Self {
            status,
            flag: Some(flag),
        }
    }
}

/// 由预订状态和参考时间推导桌台显示状态
///
/// 规则按顺序求值：
///
/// 1. 无活跃预订 → `empty`
/// 2. `(in_order, in_process)`：用餐窗口内 → `occupied`，超窗 →
///    `empty` + [`DeriveFlag::StaleInProcess`]
/// 3. `(in_order, un_visited)`：按提前量/宽限窗落入
///    `reserved` / `ready` / `empty`，三个窗口互斥且覆盖全部 lead 值
/// 4. `(in_order, visited)`：非法组合 → `empty` + [`DeriveFlag::Inconsistent`]
/// 5. `completed` / `cancelled` → `empty`
pub fn derive_status(
    reservation: Option<&Reservation>,
    reference_ms: i64,
    policy: &ReservationPolicy,
) -> Derived {
    let Some(reservation) = reservation else {
        return Derived::plain(TableStatus::Empty);
    };

    match (reservation.lifecycle, reservation.visit) {
        (LifecycleState::InOrder, VisitState::InProcess) => {
            let elapsed = reference_ms - reservation.scheduled_time;
            if elapsed <= policy.dine_window_ms() {
                Derived::plain(TableStatus::Occupied)
            } else {
                // 显示兜底，数据留给推进器修正
                Derived::flagged(TableStatus::Empty, DeriveFlag::StaleInProcess)
            }
        }
        (LifecycleState::InOrder, VisitState::UnVisited) => {
            let lead = reservation.scheduled_time - reference_ms;
            if lead > 0 && lead <= policy.lookahead_ms() {
                Derived::plain(TableStatus::Reserved)
            } else if lead <= 0 && lead >= -policy.late_grace_ms() {
                Derived::plain(TableStatus::Ready)
            } else {
                Derived::plain(TableStatus::Empty)
            }
        }
        (LifecycleState::InOrder, VisitState::Visited) => {
            Derived::flagged(TableStatus::Empty, DeriveFlag::Inconsistent)
        }
        (LifecycleState::Completed, _) | (LifecycleState::Cancelled, _) => {
            Derived::plain(TableStatus::Empty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Reservation;
    use shared::util::now_millis;

    const MIN: i64 = 60_000;

    fn reservation_at(scheduled: i64, lifecycle: LifecycleState, visit: VisitState) -> Reservation {
        let mut r = Reservation::new("Test", "600000000", 2, scheduled);
        r.lifecycle = lifecycle;
        r.visit = visit;
        r
    }

    fn derive(r: &Reservation, reference: i64) -> Derived {
        derive_status(Some(r), reference, &ReservationPolicy::default())
    }

    #[test]
    fn test_no_reservation_is_empty() {
        let d = derive_status(None, now_millis(), &ReservationPolicy::default());
        assert_eq!(d.status, TableStatus::Empty);
        assert_eq!(d.flag, None);
    }

    #[test]
    fn test_in_process_within_dine_window_is_occupied() {
        let t = now_millis();
        let r = reservation_at(t, LifecycleState::InOrder, VisitState::InProcess);
        assert_eq!(derive(&r, t + 20 * MIN).status, TableStatus::Occupied);
        // 边界：正好 30 分钟仍算用餐中
        assert_eq!(derive(&r, t + 30 * MIN).status, TableStatus::Occupied);
    }

    #[test]
    fn test_in_process_past_dine_window_is_stale_empty() {
        let t = now_millis();
        let r = reservation_at(t, LifecycleState::InOrder, VisitState::InProcess);
        let d = derive(&r, t + 30 * MIN + 1);
        assert_eq!(d.status, TableStatus::Empty);
        assert_eq!(d.flag, Some(DeriveFlag::StaleInProcess));
    }

    #[test]
    fn test_un_visited_windows() {
        let t = now_millis();
        let r = reservation_at(t, LifecycleState::InOrder, VisitState::UnVisited);

        // 太早：lead > 10min
        assert_eq!(derive(&r, t - 15 * MIN).status, TableStatus::Empty);
        // 提前窗口内
        assert_eq!(derive(&r, t - 8 * MIN).status, TableStatus::Reserved);
        assert_eq!(derive(&r, t - 10 * MIN).status, TableStatus::Reserved);
        // lead = 0 属于 ready 窗口
        assert_eq!(derive(&r, t).status, TableStatus::Ready);
        assert_eq!(derive(&r, t + MIN).status, TableStatus::Ready);
        assert_eq!(derive(&r, t + 5 * MIN).status, TableStatus::Ready);
        // 太迟：展示上不再占位
        assert_eq!(derive(&r, t + 5 * MIN + 1).status, TableStatus::Empty);
    }

    #[test]
    fn test_un_visited_windows_are_total_and_disjoint() {
        let t = now_millis();
        let r = reservation_at(t, LifecycleState::InOrder, VisitState::UnVisited);

        // 扫过 lead ∈ [-20min, +20min]，每个值恰好落入一个窗口
        for lead_min in -20..=20 {
            for offset in [-1i64, 0, 1] {
                let reference = t - lead_min * MIN - offset;
                let d = derive(&r, reference);
                assert!(
                    matches!(
                        d.status,
                        TableStatus::Empty | TableStatus::Reserved | TableStatus::Ready
                    ),
                    "lead {}min{:+} derived {:?}",
                    lead_min,
                    offset,
                    d.status
                );
                assert_eq!(d.flag, None);
            }
        }
    }

    #[test]
    fn test_in_order_visited_is_flagged_inconsistent() {
        let t = now_millis();
        let r = reservation_at(t, LifecycleState::InOrder, VisitState::Visited);
        let d = derive(&r, t);
        assert_eq!(d.status, TableStatus::Empty);
        assert_eq!(d.flag, Some(DeriveFlag::Inconsistent));
    }

    #[test]
    fn test_finished_lifecycles_are_empty() {
        let t = now_millis();
        for (l, v) in [
            (LifecycleState::Completed, VisitState::Visited),
            (LifecycleState::Cancelled, VisitState::UnVisited),
            // 非法组合也只显示 empty，修复交给修正器
            (LifecycleState::Completed, VisitState::InProcess),
        ] {
            let r = reservation_at(t, l, v);
            assert_eq!(derive(&r, t).status, TableStatus::Empty);
        }
    }

    #[test]
    fn test_custom_policy_thresholds() {
        let policy = ReservationPolicy {
            lookahead_mins: 30,
            late_grace_mins: 15,
            dine_window_mins: 120,
        };
        let t = now_millis();
        let r = reservation_at(t, LifecycleState::InOrder, VisitState::UnVisited);
        assert_eq!(
            derive_status(Some(&r), t - 25 * MIN, &policy).status,
            TableStatus::Reserved
        );
        assert_eq!(
            derive_status(Some(&r), t + 12 * MIN, &policy).status,
            TableStatus::Ready
        );

        let mut dining = r.clone();
        dining.visit = VisitState::InProcess;
        assert_eq!(
            derive_status(Some(&dining), t + 90 * MIN, &policy).status,
            TableStatus::Occupied
        );
    }
}
