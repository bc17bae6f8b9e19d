//! 引擎统一错误处理
//!
//! 错误分类：
//!
//! | 变体 | 说明 |
//! |------|------|
//! | `PassInProgress` | 手动触发时已有对账在执行 (调用方可等待或忽略) |
//! | `SimulationMode` | 自定义时间模式下尝试了写操作 |
//! | `InvalidReferenceTime` | 参考时间超出合理性边界，在 API 边界拒绝 |
//! | `Store` | 存储适配层的类型化错误，原样传播 |
//! | `Shutdown` | 引擎已关闭，工作者不再接收信号 |
//!
//! 数据不一致 (`DeriveFlag`) 不是错误：只计数、记日志、出现在对账快照里。

use crate::store::StoreError;

/// 引擎错误枚举
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Reconciliation pass already in progress")]
    PassInProgress,

    #[error("Engine is in custom-time simulation mode; mutation is disabled")]
    SimulationMode,

    #[error("Reference time {reference} is more than {bound_days} day(s) from now")]
    InvalidReferenceTime { reference: i64, bound_days: i64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine is shutting down")]
    Shutdown,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
