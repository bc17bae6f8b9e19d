/// 预订时间窗策略 - 显示推导与写推进共用的业务常量
///
/// 这些阈值是业务策略而非物理常量：它们决定员工何时看到桌台显示为
/// "即将占用"、迟到多久算未到店、用餐多久算超时。显示层 (状态推导)
/// 和写入层 (时间窗推进器) 是同一份策略的两个视角，必须共用同一个
/// 结构体，防止两处字面量漂移。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// 预订展示提前量 (分钟): 0 < lead ≤ lookahead → `reserved`
    pub lookahead_mins: i64,
    /// 迟到宽限 (分钟): 过点未签到的 `ready` 窗口，也是未到店取消阈值
    pub late_grace_mins: i64,
    /// 用餐时间窗 (分钟): 签到后超过此时长视为超时，自动结账
    pub dine_window_mins: i64,
}

impl ReservationPolicy {
    pub fn lookahead_ms(&self) -> i64 {
        self.lookahead_mins * 60_000
    }

    pub fn late_grace_ms(&self) -> i64 {
        self.late_grace_mins * 60_000
    }

    pub fn dine_window_ms(&self) -> i64 {
        self.dine_window_mins * 60_000
    }
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            lookahead_mins: 10,
            late_grace_mins: 5,
            dine_window_mins: 30,
        }
    }
}

/// 引擎配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | FLOOR_LOOKAHEAD_MINS | 10 | 预订展示提前量 (分钟) |
/// | FLOOR_LATE_GRACE_MINS | 5 | 迟到宽限 (分钟) |
/// | FLOOR_DINE_WINDOW_MINS | 30 | 用餐时间窗 (分钟) |
/// | FLOOR_RECONCILE_INTERVAL_SECS | 60 | 对账周期 (秒) |
/// | FLOOR_WRITE_RETRY_LIMIT | 3 | 单次写入的瞬态错误重试次数 |
/// | FLOOR_MAX_REFERENCE_SKEW_DAYS | 366 | 参考时间偏移合理性上限 (天) |
///
/// # 示例
///
/// ```ignore
/// FLOOR_DINE_WINDOW_MINS=45 FLOOR_RECONCILE_INTERVAL_SECS=30 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 时间窗策略 (显示 + 推进共用)
    pub policy: ReservationPolicy,
    /// 定时对账间隔 (秒)
    pub reconcile_interval_secs: u64,
    /// 单个预订写入失败的重试上限 (瞬态错误)
    pub write_retry_limit: u32,
    /// 参考时间偏离当前时刻的合理性上限 (天)
    pub max_reference_skew_days: i64,
}

impl EngineConfig {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let defaults = ReservationPolicy::default();
        Self {
            policy: ReservationPolicy {
                lookahead_mins: env_parse("FLOOR_LOOKAHEAD_MINS", defaults.lookahead_mins),
                late_grace_mins: env_parse("FLOOR_LATE_GRACE_MINS", defaults.late_grace_mins),
                dine_window_mins: env_parse("FLOOR_DINE_WINDOW_MINS", defaults.dine_window_mins),
            },
            reconcile_interval_secs: env_parse("FLOOR_RECONCILE_INTERVAL_SECS", 60),
            write_retry_limit: env_parse("FLOOR_WRITE_RETRY_LIMIT", 3),
            max_reference_skew_days: env_parse("FLOOR_MAX_REFERENCE_SKEW_DAYS", 366),
        }
    }

    /// 使用自定义策略覆盖配置
    ///
    /// 常用于测试场景
    pub fn with_policy(policy: ReservationPolicy) -> Self {
        let mut config = Self::default();
        config.policy = policy;
        config
    }

    /// 参考时间偏移上限 (毫秒)
    pub fn max_reference_skew_ms(&self) -> i64 {
        self.max_reference_skew_days * 86_400_000
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: ReservationPolicy::default(),
            reconcile_interval_secs: 60,
            write_retry_limit: 3,
            max_reference_skew_days: 366,
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
