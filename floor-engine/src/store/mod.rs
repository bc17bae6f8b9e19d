//! 存储适配层
//!
//! 引擎对预订存储的类型化访问边界。持久化本身是外部协作者：引擎只
//! 消费本模块的 trait，不拥有任何存储实现。[`MemoryStore`] 提供一个
//! 进程内实现，供测试和演示使用。

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use shared::models::{DiningTable, LifecycleState, Reservation, TableAssignment, VisitState};
use thiserror::Error;

/// Store 错误类型
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// 读/写失败但值得重试 (网络抖动、锁超时等)
    #[error("Transient store error: {0}")]
    Transient(String),
}

impl StoreError {
    /// 瞬态错误由调用方在单次对账内做有限重试
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// 预订存储适配接口
///
/// 每个写入都必须是幂等的：对同一预订重复写入同一状态是无害的
/// no-op，这使得重试和重复触发都安全。
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// 全部启用中的桌台
    async fn list_tables(&self) -> StoreResult<Vec<DiningTable>>;

    /// 活跃 (`in_order`) 预订
    async fn list_active_reservations(&self) -> StoreResult<Vec<Reservation>>;

    /// 全部预订 (一致性修正器需要扫描非活跃预订)
    async fn list_reservations(&self) -> StoreResult<Vec<Reservation>>;

    /// 给定预订集合的桌台关联
    async fn list_table_assignments(
        &self,
        reservation_ids: &[i64],
    ) -> StoreResult<Vec<TableAssignment>>;

    /// 幂等地改写一个预订的 (lifecycle, visit) 状态
    async fn update_reservation_state(
        &self,
        id: i64,
        lifecycle: LifecycleState,
        visit: VisitState,
    ) -> StoreResult<()>;
}
