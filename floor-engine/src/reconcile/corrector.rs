//! 一致性修正器
//!
//! 扫描全部预订，把非法的 (lifecycle, visit) 组合改写为最近的合法
//! 组合。每次修正是一个独立的幂等写入，按预订各自独立，没有顺序
//! 要求。

use shared::models::{LifecycleState, Reservation, VisitState};

use super::write_with_retry;
use crate::store::{ReservationStore, StoreResult};

/// 一次修正扫描的结果
#[derive(Debug, Default)]
pub struct CorrectionOutcome {
    /// 被改写的预订 (审计用)
    pub corrected_ids: Vec<i64>,
    /// 重试耗尽后跳过、留待下次对账的预订数
    pub skipped: u32,
}

/// 非法组合 → 最近的合法组合
///
/// 合法组合返回 `None` (无需修正)。
pub fn repair_pair(
    lifecycle: LifecycleState,
    visit: VisitState,
) -> Option<(LifecycleState, VisitState)> {
    match (lifecycle, visit) {
        // 已结束但仍标记用餐中：视为已离店
        (LifecycleState::Completed, VisitState::InProcess) => {
            Some((LifecycleState::Completed, VisitState::Visited))
        }
        (LifecycleState::Completed, VisitState::UnVisited) => {
            Some((LifecycleState::Completed, VisitState::Visited))
        }
        // 已取消的预订不可能在店内
        (LifecycleState::Cancelled, VisitState::InProcess)
        | (LifecycleState::Cancelled, VisitState::Visited) => {
            Some((LifecycleState::Cancelled, VisitState::UnVisited))
        }
        // 已离店却还在 in_order：应当是 completed
        (LifecycleState::InOrder, VisitState::Visited) => {
            Some((LifecycleState::Completed, VisitState::Visited))
        }
        _ => None,
    }
}

/// 对全部预订执行一次修正扫描
pub async fn run_corrector(
    store: &dyn ReservationStore,
    retry_limit: u32,
) -> StoreResult<CorrectionOutcome> {
    let reservations: Vec<Reservation> = store.list_reservations().await?;
    let mut outcome = CorrectionOutcome::default();

    for reservation in &reservations {
        let Some((lifecycle, visit)) = repair_pair(reservation.lifecycle, reservation.visit)
        else {
            continue;
        };

        tracing::info!(
            reservation = reservation.id,
            from = ?reservation.state_pair(),
            to = ?(lifecycle, visit),
            "Rewriting inconsistent reservation state"
        );

        match write_with_retry(store, reservation.id, lifecycle, visit, retry_limit).await {
            Ok(()) => outcome.corrected_ids.push(reservation.id),
            Err(e) => {
                // 单个预订失败不中止扫描，下次对账重试
                tracing::error!(
                    reservation = reservation.id,
                    error = %e,
                    "Skipping consistency correction for this pass"
                );
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shared::models::Reservation;
    use shared::util::now_millis;

    fn corrupt(lifecycle: LifecycleState, visit: VisitState) -> Reservation {
        let mut r = Reservation::new("Corrupt", "600", 2, now_millis());
        r.lifecycle = lifecycle;
        r.visit = visit;
        r
    }

    #[test]
    fn test_repair_mapping() {
        assert_eq!(
            repair_pair(LifecycleState::Completed, VisitState::InProcess),
            Some((LifecycleState::Completed, VisitState::Visited))
        );
        assert_eq!(
            repair_pair(LifecycleState::Cancelled, VisitState::InProcess),
            Some((LifecycleState::Cancelled, VisitState::UnVisited))
        );
        assert_eq!(
            repair_pair(LifecycleState::InOrder, VisitState::Visited),
            Some((LifecycleState::Completed, VisitState::Visited))
        );
    }

    #[test]
    fn test_legal_pairs_need_no_repair() {
        assert_eq!(repair_pair(LifecycleState::InOrder, VisitState::UnVisited), None);
        assert_eq!(repair_pair(LifecycleState::InOrder, VisitState::InProcess), None);
        assert_eq!(repair_pair(LifecycleState::Completed, VisitState::Visited), None);
        assert_eq!(repair_pair(LifecycleState::Cancelled, VisitState::UnVisited), None);
    }

    #[tokio::test]
    async fn test_corrector_rewrites_corrupt_pairs() {
        let store = MemoryStore::new();
        let bad = corrupt(LifecycleState::Completed, VisitState::InProcess);
        let bad_id = bad.id;
        let good = Reservation::new("Fine", "601", 2, now_millis());
        store.insert_reservation(bad);
        store.insert_reservation(good);

        let outcome = run_corrector(&store, 3).await.unwrap();
        assert_eq!(outcome.corrected_ids, vec![bad_id]);
        assert_eq!(outcome.skipped, 0);

        let fixed = store.get_reservation(bad_id).unwrap();
        assert_eq!(
            fixed.state_pair(),
            (LifecycleState::Completed, VisitState::Visited)
        );
    }

    #[tokio::test]
    async fn test_corrector_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_reservation(corrupt(LifecycleState::InOrder, VisitState::Visited));
        store.insert_reservation(corrupt(LifecycleState::Cancelled, VisitState::InProcess));

        let first = run_corrector(&store, 3).await.unwrap();
        assert_eq!(first.corrected_ids.len(), 2);
        let writes_after_first = store.write_count();

        // 第二次扫描：数据已合法，零写入
        let second = run_corrector(&store, 3).await.unwrap();
        assert!(second.corrected_ids.is_empty());
        assert_eq!(store.write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = MemoryStore::new();
        let bad = corrupt(LifecycleState::Completed, VisitState::InProcess);
        let bad_id = bad.id;
        store.insert_reservation(bad);

        // 两次瞬态失败，重试上限 3 → 最终成功
        store.fail_next_writes(2);
        let outcome = run_corrector(&store, 3).await.unwrap();
        assert_eq!(outcome.corrected_ids, vec![bad_id]);
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_skip_reservation() {
        let store = MemoryStore::new();
        let bad = corrupt(LifecycleState::Completed, VisitState::InProcess);
        let bad_id = bad.id;
        store.insert_reservation(bad);

        store.fail_next_writes(10);
        let outcome = run_corrector(&store, 2).await.unwrap();
        assert!(outcome.corrected_ids.is_empty());
        assert_eq!(outcome.skipped, 1);
        // 数据未动，下次对账修复
        assert_eq!(
            store.get_reservation(bad_id).unwrap().state_pair(),
            (LifecycleState::Completed, VisitState::InProcess)
        );

        let retry = run_corrector(&store, 2).await.unwrap();
        assert_eq!(retry.corrected_ids, vec![bad_id]);
    }
}
