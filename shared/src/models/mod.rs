//! Domain Models

pub mod dining_table;
pub mod reservation;
pub mod table_assignment;

// Re-exports
pub use dining_table::DiningTable;
pub use reservation::{LifecycleState, Reservation, VisitState};
pub use table_assignment::TableAssignment;
