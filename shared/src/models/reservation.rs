//! Reservation Model
//!
//! A reservation (历史上称 "Bill") is the unit of scheduling: a party
//! booked onto one or more tables at a scheduled instant. Lifecycle and
//! visit state are mutated only by the reconciliation engine or explicit
//! staff actions; reservations are never deleted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::util::{now_millis, snowflake_id};

/// Coarse reservation lifecycle (预订生命周期)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Active booking
    InOrder,
    /// Party has dined and left
    Completed,
    /// Booking was cancelled (staff action or no-show)
    Cancelled,
}

/// Fine-grained check-in progress (到店状态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitState {
    /// Not yet arrived
    UnVisited,
    /// Currently dining
    InProcess,
    /// Departed
    Visited,
}

/// 合法的 (lifecycle, visit) 稳态组合
///
/// 其余组合都是可检测的数据错误，由引擎的一致性修正器改写。
pub fn is_legal_pair(lifecycle: LifecycleState, visit: VisitState) -> bool {
    matches!(
        (lifecycle, visit),
        (LifecycleState::InOrder, VisitState::UnVisited)
            | (LifecycleState::InOrder, VisitState::InProcess)
            | (LifecycleState::Completed, VisitState::Visited)
            | (LifecycleState::Cancelled, VisitState::UnVisited)
    )
}

/// Reservation entity (预订)
///
/// All instants are Unix millis (UTC). `total_price` is owned by the
/// order-line subsystem and is read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub customer_name: String,
    pub phone: String,
    pub party_size: u32,
    pub note: Option<String>,
    /// Instant the party is expected (Unix millis)
    pub scheduled_time: i64,
    pub lifecycle: LifecycleState,
    pub visit: VisitState,
    pub total_price: Decimal,
    pub created_at: i64,
}

impl Reservation {
    /// Create a fresh booking in `(in_order, un_visited)` state
    pub fn new(
        customer_name: impl Into<String>,
        phone: impl Into<String>,
        party_size: u32,
        scheduled_time: i64,
    ) -> Self {
        Self {
            id: snowflake_id(),
            customer_name: customer_name.into(),
            phone: phone.into(),
            party_size,
            note: None,
            scheduled_time,
            lifecycle: LifecycleState::InOrder,
            visit: VisitState::UnVisited,
            total_price: Decimal::ZERO,
            created_at: now_millis(),
        }
    }

    /// Active = still in the `in_order` lifecycle
    pub fn is_active(&self) -> bool {
        self.lifecycle == LifecycleState::InOrder
    }

    pub fn state_pair(&self) -> (LifecycleState, VisitState) {
        (self.lifecycle, self.visit)
    }
}
