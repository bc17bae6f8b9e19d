//! 核心模块 - 配置、错误、后台任务

pub mod config;
pub mod error;
pub mod tasks;

pub use config::{EngineConfig, ReservationPolicy};
pub use error::{EngineError, EngineResult};
pub use tasks::{BackgroundTasks, TaskKind};
