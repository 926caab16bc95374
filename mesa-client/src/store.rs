//! Remote store contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::types::EntityId;
use std::fmt;
use tokio::sync::broadcast;

use crate::ClientResult;

/// A raw row as stored remotely (snake_case keys)
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Persisted collections
///
/// Tables, drafts and bills are terminal-local and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Reservations,
    /// Events and budgets
    Agenda,
    EventMenus,
    KitchenTickets,
    VenueInfo,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Self::Reservations,
        Self::Agenda,
        Self::EventMenus,
        Self::KitchenTickets,
        Self::VenueInfo,
    ];

    /// Remote table name
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Reservations => "reservations",
            Self::Agenda => "agenda",
            Self::EventMenus => "event_menus",
            Self::KitchenTickets => "kitchen_tickets",
            Self::VenueInfo => "venue_info",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// "Something changed in this collection"
///
/// Carries no diff; receivers re-fetch. Delivery is at-least-once and
/// unordered across collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSignal {
    pub collection: Collection,
}

/// CRUD + change notifications against the shared remote store
///
/// Rows cross this boundary in wire form; see [`crate::wire`].
#[async_trait]
pub trait RemoteStore: Send + Sync + fmt::Debug {
    /// Fetch every row of a collection
    async fn select(&self, collection: Collection) -> ClientResult<Vec<Row>>;

    /// Insert a row; returns it as stored (server-assigned `id`, `created_at`)
    async fn insert(&self, collection: Collection, row: Row) -> ClientResult<Row>;

    /// Apply a field-set patch to one row; returns the row as stored
    async fn update(&self, collection: Collection, id: &EntityId, patch: Row) -> ClientResult<Row>;

    /// Apply a patch only while `column` is still null on the row
    ///
    /// Returns the stored row, or `None` when the column was already set
    /// (or the row is gone). Used for write-once columns.
    async fn update_if_null(
        &self,
        collection: Collection,
        id: &EntityId,
        column: &str,
        patch: Row,
    ) -> ClientResult<Option<Row>>;

    async fn delete(&self, collection: Collection, id: &EntityId) -> ClientResult<()>;

    /// Subscribe to change signals
    fn changes(&self) -> broadcast::Receiver<ChangeSignal>;
}
