//! 内存存储实现
//!
//! 进程内的 [`ReservationStore`] 实现，用于测试和演示。带有测试用的
//! 观测点：状态写入计数、瞬态故障注入、人为操作延迟、并发扫描水位。

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use shared::models::{DiningTable, LifecycleState, Reservation, TableAssignment, VisitState};

use super::{ReservationStore, StoreError, StoreResult};

/// In-memory reservation store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    tables: DashMap<i64, DiningTable>,
    reservations: DashMap<i64, Reservation>,
    assignments: RwLock<Vec<TableAssignment>>,
    /// 状态写入总次数 (含 no-op 写入)
    write_count: AtomicU64,
    /// 注入的瞬态写入失败剩余次数
    fail_writes: AtomicU32,
    /// 人为操作延迟 (毫秒)，用于并发测试拉长一次对账
    op_delay_ms: AtomicU64,
    /// 当前并发扫描数及其历史最大值
    active_scans: AtomicU32,
    max_active_scans: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&self, table: DiningTable) {
        self.inner.tables.insert(table.id, table);
    }

    pub fn insert_reservation(&self, reservation: Reservation) {
        self.inner
            .reservations
            .insert(reservation.id, reservation);
    }

    /// 预订与桌台建立关联 (预订创建时由订位流程原子完成)
    pub fn assign(&self, reservation_id: i64, table_id: i64) {
        self.inner
            .assignments
            .write()
            .push(TableAssignment::new(reservation_id, table_id));
    }

    pub fn get_reservation(&self, id: i64) -> Option<Reservation> {
        self.inner.reservations.get(&id).map(|r| r.value().clone())
    }

    // ========================================================================
    // Test instrumentation
    // ========================================================================

    /// 已执行的状态写入次数
    pub fn write_count(&self) -> u64 {
        self.inner.write_count.load(Ordering::SeqCst)
    }

    /// 注入 n 次瞬态写入失败
    pub fn fail_next_writes(&self, n: u32) {
        self.inner.fail_writes.store(n, Ordering::SeqCst);
    }

    /// 所有读写操作附加固定延迟
    pub fn set_op_delay(&self, delay: Duration) {
        self.inner
            .op_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// 观测到的最大并发扫描数 (对账互斥时恒为 1)
    pub fn max_concurrent_scans(&self) -> u32 {
        self.inner.max_active_scans.load(Ordering::SeqCst)
    }

    async fn scan_guard(&self) -> ScanGuard<'_> {
        let active = self.inner.active_scans.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .max_active_scans
            .fetch_max(active, Ordering::SeqCst);
        let delay = self.inner.op_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        ScanGuard { store: &self.inner }
    }
}

struct ScanGuard<'a> {
    store: &'a MemoryStoreInner,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.store.active_scans.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn list_tables(&self) -> StoreResult<Vec<DiningTable>> {
        let _guard = self.scan_guard().await;
        let mut tables: Vec<DiningTable> = self
            .inner
            .tables
            .iter()
            .filter(|t| t.is_active)
            .map(|t| t.value().clone())
            .collect();
        tables.sort_by_key(|t| t.id);
        Ok(tables)
    }

    async fn list_active_reservations(&self) -> StoreResult<Vec<Reservation>> {
        let _guard = self.scan_guard().await;
        let mut reservations: Vec<Reservation> = self
            .inner
            .reservations
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.value().clone())
            .collect();
        reservations.sort_by_key(|r| r.id);
        Ok(reservations)
    }

    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>> {
        let _guard = self.scan_guard().await;
        let mut reservations: Vec<Reservation> = self
            .inner
            .reservations
            .iter()
            .map(|r| r.value().clone())
            .collect();
        reservations.sort_by_key(|r| r.id);
        Ok(reservations)
    }

    async fn list_table_assignments(
        &self,
        reservation_ids: &[i64],
    ) -> StoreResult<Vec<TableAssignment>> {
        let _guard = self.scan_guard().await;
        Ok(self
            .inner
            .assignments
            .read()
            .iter()
            .filter(|a| reservation_ids.contains(&a.reservation_id))
            .cloned()
            .collect())
    }

    async fn update_reservation_state(
        &self,
        id: i64,
        lifecycle: LifecycleState,
        visit: VisitState,
    ) -> StoreResult<()> {
        let delay = self.inner.op_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        // 故障注入：倒数 n 次写入返回瞬态错误
        let mut failures = self.inner.fail_writes.load(Ordering::SeqCst);
        while failures > 0 {
            match self.inner.fail_writes.compare_exchange(
                failures,
                failures - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Err(StoreError::Transient(format!(
                        "injected write failure for reservation {}",
                        id
                    )));
                }
                Err(current) => failures = current,
            }
        }

        let mut reservation = self
            .inner
            .reservations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Reservation {} not found", id)))?;
        reservation.lifecycle = lifecycle;
        reservation.visit = visit;
        self.inner.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
