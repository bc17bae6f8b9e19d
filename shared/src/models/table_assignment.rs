//! Table Assignment Model

use serde::{Deserialize, Serialize};

use crate::util::now_millis;

/// Link from a reservation to one of its tables (一个预订可占多桌)
///
/// Created atomically with the reservation by the booking flow and
/// immutable afterwards; cancellation is interpreted through the
/// reservation's lifecycle state, the link itself is never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableAssignment {
    pub reservation_id: i64,
    pub table_id: i64,
    pub created_at: i64,
}

impl TableAssignment {
    pub fn new(reservation_id: i64, table_id: i64) -> Self {
        Self {
            reservation_id,
            table_id,
            created_at: now_millis(),
        }
    }
}
