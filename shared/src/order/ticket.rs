//! Kitchen ticket (厨房单)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ItemStatus, OrderItem};
use crate::types::EntityId;

/// Ticket preparation status; moves forward only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Pending,
    Ready,
    Served,
}

/// Immutable batch of items dispatched to the kitchen together
///
/// The item list never changes after creation; only `status` and each
/// item's `item_status` do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KitchenTicket {
    pub id: EntityId,
    pub table_id: EntityId,
    pub table_name: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: TicketStatus,
    /// Terminal that sent the ticket
    #[serde(default)]
    pub terminal_id: Option<String>,
}

impl KitchenTicket {
    pub fn all_items_ready(&self) -> bool {
        self.items.iter().all(|i| i.item_status == ItemStatus::Ready)
    }

    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
