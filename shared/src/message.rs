//! 变更通知消息类型
//!
//! Emitted by the entity store after every local mutation and every remote
//! merge, and consumed by views and background tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorCode;
use crate::types::EntityId;

/// Kind of entity a notice refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    Reservation,
    EventBudget,
    EventMenu,
    KitchenTicket,
    Draft,
    Bill,
    VenueInfo,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Reservation => "reservation",
            Self::EventBudget => "event_budget",
            Self::EventMenu => "event_menu",
            Self::KitchenTicket => "kitchen_ticket",
            Self::Draft => "draft",
            Self::Bill => "bill",
            Self::VenueInfo => "venue_info",
        }
    }

    /// Every kind, in a stable order
    pub const ALL: [EntityKind; 8] = [
        Self::Table,
        Self::Reservation,
        Self::EventBudget,
        Self::EventMenu,
        Self::KitchenTicket,
        Self::Draft,
        Self::Bill,
        Self::VenueInfo,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
    /// Whole collection replaced by a remote merge
    Reloaded,
    /// A pending remote write was confirmed
    Confirmed,
    /// A pending remote write failed; local state may have been reverted
    Failed,
}

/// Change notice (变更信号)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotice {
    pub kind: EntityKind,
    pub action: ChangeAction,
    /// `None` for collection-wide notices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    /// Store revision after the change was applied
    pub revision: u64,
}

impl ChangeNotice {
    pub fn entity(kind: EntityKind, action: ChangeAction, id: EntityId, revision: u64) -> Self {
        Self {
            kind,
            action,
            id: Some(id),
            revision,
        }
    }

    pub fn collection(kind: EntityKind, revision: u64) -> Self {
        Self {
            kind,
            action: ChangeAction::Reloaded,
            id: None,
            revision,
        }
    }
}

/// Operation that a remote write performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    Insert,
    Update,
    Delete,
    Fetch,
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Fetch => "fetch",
        };
        f.write_str(s)
    }
}

/// Sync failure notice, delivered to sync-error observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub op: SyncOp,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub code: ErrorCode,
    pub message: String,
    /// Whether the local change was rolled back
    pub reverted: bool,
}
