//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Dining table entity (桌台)
///
/// Carries no persisted status field: occupancy is always derived from
/// the reservation state plus a reference time, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: i64,
    pub name: String,
    /// Floor / dining area label, e.g. "ground", "terrace"
    pub floor: String,
    pub capacity: u32,
    pub is_active: bool,
}

impl DiningTable {
    pub fn new(id: i64, name: impl Into<String>, floor: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            floor: floor.into(),
            capacity,
            is_active: true,
        }
    }
}
