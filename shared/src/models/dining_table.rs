//! Dining Table Model

use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// Dining table entity (桌台)
///
/// Occupancy is never stored: [`TableStatus`] is derived from the table's
/// draft order, kitchen tickets, bill and reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningTable {
    pub id: EntityId,
    pub name: String,
    pub zone: String,
    #[serde(default)]
    pub is_manually_reserved: bool,
}

/// Create dining table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningTableCreate {
    pub name: String,
    pub zone: String,
}

/// Derived table status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    #[default]
    Free,
    Occupied,
    Reserved,
}
