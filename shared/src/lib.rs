//! Shared types for the floor engine workspace
//!
//! Domain models (reservations, dining tables, table assignments) and
//! small utilities used by every crate in the workspace.

pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
