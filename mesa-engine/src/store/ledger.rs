//! Pending-operation ledger
//!
//! Every remote write is recorded here from the moment its local half is
//! applied until the remote confirms it. Failed updates and deletes stay in
//! the ledger (flagged) until retried or discarded; the refetch merge reads
//! the ledger to keep local intent on top of remote rows.

use mesa_client::Collection;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::message::{EntityKind, SyncOp};
use shared::types::EntityId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static OP_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Correlates a local apply with its remote commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OpId {
    /// Process-local sequence, orders ops by creation
    pub seq: u64,
    pub uuid: uuid::Uuid,
}

impl OpId {
    pub fn next() -> Self {
        Self {
            seq: OP_SEQUENCE.fetch_add(1, Ordering::SeqCst),
            uuid: uuid::Uuid::new_v4(),
        }
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.seq, self.uuid.simple())
    }
}

/// What the remote commit does
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpAction {
    /// Full entity as sent (camelCase)
    Insert { payload: Map<String, Value> },
    /// Field-set patch (camelCase)
    Update { patch: Map<String, Value> },
    Delete,
}

impl OpAction {
    pub fn sync_op(&self) -> SyncOp {
        match self {
            OpAction::Insert { .. } => SyncOp::Insert,
            OpAction::Update { .. } => SyncOp::Update,
            OpAction::Delete => SyncOp::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OpStatus {
    InFlight,
    Failed { message: String },
}

/// One ledger entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOp {
    pub id: OpId,
    pub collection: Collection,
    pub kind: EntityKind,
    pub entity_id: EntityId,
    pub action: OpAction,
    pub status: OpStatus,
    /// Unix millis of the local apply
    pub created_at: i64,
}

impl PendingOp {
    pub fn new(collection: Collection, kind: EntityKind, entity_id: EntityId, action: OpAction) -> Self {
        Self {
            id: OpId::next(),
            collection,
            kind,
            entity_id,
            action,
            status: OpStatus::InFlight,
            created_at: shared::util::now_millis(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OpStatus::Failed { .. })
    }
}

/// Ordered set of pending ops
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    ops: Vec<PendingOp>,
}

impl Ledger {
    pub fn push(&mut self, op: PendingOp) -> OpId {
        let id = op.id;
        self.ops.push(op);
        id
    }

    pub fn get(&self, id: OpId) -> Option<&PendingOp> {
        self.ops.iter().find(|op| op.id == id)
    }

    pub fn get_mut(&mut self, id: OpId) -> Option<&mut PendingOp> {
        self.ops.iter_mut().find(|op| op.id == id)
    }

    pub fn remove(&mut self, id: OpId) -> Option<PendingOp> {
        let index = self.ops.iter().position(|op| op.id == id)?;
        Some(self.ops.remove(index))
    }

    pub fn mark_failed(&mut self, id: OpId, message: impl Into<String>) {
        if let Some(op) = self.get_mut(id) {
            op.status = OpStatus::Failed {
                message: message.into(),
            };
        }
    }

    /// Ops for one collection, oldest first
    pub fn for_collection(&self, collection: Collection) -> impl Iterator<Item = &PendingOp> {
        self.ops.iter().filter(move |op| op.collection == collection)
    }

    /// Update patches still pending for an entity, oldest first
    pub fn patches_for<'a>(
        &'a self,
        collection: Collection,
        entity_id: &'a EntityId,
        except: Option<OpId>,
    ) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
        self.ops
            .iter()
            .filter(move |op| {
                op.collection == collection && &op.entity_id == entity_id && Some(op.id) != except
            })
            .filter_map(|op| match &op.action {
                OpAction::Update { patch } => Some(patch),
                _ => None,
            })
    }

    /// In-flight insert for a locally minted id
    pub fn insert_for(&self, collection: Collection, entity_id: &EntityId) -> Option<&PendingOp> {
        self.ops.iter().find(|op| {
            op.collection == collection
                && &op.entity_id == entity_id
                && matches!(op.action, OpAction::Insert { .. })
        })
    }

    /// Drop failed updates superseded by a delete
    pub fn drop_failed_updates(&mut self, collection: Collection, entity_id: &EntityId) {
        self.ops.retain(|op| {
            !(op.collection == collection
                && &op.entity_id == entity_id
                && op.is_failed()
                && matches!(op.action, OpAction::Update { .. }))
        });
    }

    pub fn is_flagged(&self, entity_id: &EntityId) -> bool {
        self.ops
            .iter()
            .any(|op| &op.entity_id == entity_id && op.is_failed())
    }

    pub fn all(&self) -> &[PendingOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
