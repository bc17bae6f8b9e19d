//! Floor Engine - 桌台占用与预订对账引擎
//!
//! # 架构概述
//!
//! 将每个预订的生命周期状态和参考时间映射为桌台的显示状态，并周期性
//! 地检测过期/不一致的预订并自动推进（自动结账、未到店取消、数据修复）。
//!
//! - **状态推导** (`status`): 纯函数，预订 + 参考时间 → 桌台状态
//! - **楼面投影** (`projection`): 全部桌台与活跃预订的联接视图
//! - **对账** (`reconcile`): 一致性修正器 + 时间窗推进器 + 调度器
//! - **存储适配** (`store`): 外部预订存储的类型化访问边界
//! - **变更订阅** (`feed`): 变更通知触发轻量重投影
//!
//! # 模块结构
//!
//! ```text
//! floor-engine/src/
//! ├── core/          # 配置、错误、后台任务
//! ├── store/         # 存储适配层 (trait + 内存实现)
//! ├── status.rs      # 状态推导 (纯函数)
//! ├── projection.rs  # 楼面投影
//! ├── reconcile/     # 修正器、推进器、调度器
//! ├── feed.rs        # 变更订阅监听
//! └── engine.rs      # FloorEngine 门面
//! ```

pub mod core;
pub mod engine;
pub mod feed;
pub mod logging;
pub mod projection;
pub mod reconcile;
pub mod status;
pub mod store;

// Re-export 公共类型
pub use crate::core::{
    BackgroundTasks, EngineConfig, EngineError, EngineResult, ReservationPolicy, TaskKind,
};
pub use engine::FloorEngine;
pub use feed::{ChangeFeed, ChannelFeed, FeedCollection, FeedEvent, FeedHandle};
pub use projection::{TableView, group_by_floor};
pub use reconcile::{EngineMode, FloorUpdate, ReconciliationSnapshot, TableStatusChange};
pub use status::{Derived, DeriveFlag, TableStatus, derive_status};
pub use store::{MemoryStore, ReservationStore, StoreError, StoreResult};

// Re-export logger functions
pub use logging::{init_logger, init_logger_with_file};
